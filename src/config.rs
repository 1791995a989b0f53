use crate::harness::{
    ApacheBench, ConfigMaterializer, ExperimentSetup, HttpMethod, LoadPlan, Readiness,
    RequestBody, ServerCommand, ServerLifecycle, ServerTemplate, Sweep,
};
use crate::utils::parse_duration;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UserConfig {
    pub reports: ReportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReportConfig {
    pub default_formats: Vec<String>,
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            default_formats: vec!["html".to_string(), "csv".to_string()],
            output_dir: PathBuf::from("sweep-reports"),
        }
    }
}

impl UserConfig {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_dir()?.join("config.json");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            // a hand-edited file that no longer parses falls back to defaults
            Ok(serde_json::from_str(&content).unwrap_or_default())
        } else {
            let default_config = UserConfig::default();
            default_config.save()?;
            Ok(default_config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_dir = Self::get_config_dir()?;
        std::fs::create_dir_all(&config_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_dir.join("config.json"), content)?;

        Ok(())
    }

    fn get_config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Unable to find home directory"))?;

        Ok(PathBuf::from(home).join(".sweepbench"))
    }
}

/// One experiment file (`*.sweep.yaml`).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExperimentConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub template: ServerTemplate,
    #[serde(default)]
    pub load: LoadSettings,
    #[serde(default)]
    pub sweep: SweepSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSettings {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub config_dir: Option<PathBuf>,
    pub config_prefix: String,
    pub log: Option<PathBuf>,
    pub readiness: ReadinessSettings,
    pub shutdown_timeout: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("../../build/server"),
            args: Vec::new(),
            config_dir: None,
            config_prefix: "test".to_string(),
            log: None,
            readiness: ReadinessSettings::default(),
            shutdown_timeout: "5s".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "probe", rename_all = "snake_case")]
pub enum ReadinessSettings {
    /// Connect to the client listener port until it answers.
    Tcp {
        #[serde(default = "default_ready_timeout")]
        timeout: String,
        #[serde(default)]
        host: Option<String>,
    },
    Delay { duration: String },
}

fn default_ready_timeout() -> String {
    "10s".to_string()
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        ReadinessSettings::Tcp {
            timeout: default_ready_timeout(),
            host: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoadSettings {
    pub program: PathBuf,
    pub requests: u32,
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<PathBuf>,
    pub content_type: String,
    pub timeout: Option<String>,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ab"),
            requests: 1000,
            url: "http://127.0.0.1:4096/set".to_string(),
            method: HttpMethod::Post,
            body: Some(PathBuf::from("a.json")),
            content_type: "application/json".to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SweepSettings {
    pub server_threads: Vec<u32>,
    pub concurrency: Vec<u32>,
    pub repeats: u32,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            server_threads: vec![1, 10, 20, 50],
            concurrency: (1..10).chain((10..110).step_by(10)).collect(),
            repeats: 3,
        }
    }
}

impl ExperimentConfig {
    pub fn sample(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some("Set throughput against server thread pool size".to_string()),
            server: ServerSettings::default(),
            template: ServerTemplate::default(),
            load: LoadSettings::default(),
            sweep: SweepSettings::default(),
        }
    }

    pub fn readiness(&self) -> Result<Readiness> {
        Ok(match &self.server.readiness {
            ReadinessSettings::Tcp { timeout, host } => Readiness::TcpConnect {
                address: format!(
                    "{}:{}",
                    host.as_deref().unwrap_or("127.0.0.1"),
                    self.template.client_listener_port
                ),
                timeout: parse_duration(timeout)
                    .with_context(|| format!("Invalid readiness timeout '{}'", timeout))?,
            },
            ReadinessSettings::Delay { duration } => Readiness::Delay(
                parse_duration(duration)
                    .with_context(|| format!("Invalid startup delay '{}'", duration))?,
            ),
        })
    }

    pub fn load_plan(&self) -> Result<LoadPlan> {
        let target = Url::parse(&self.load.url)
            .with_context(|| format!("Invalid target URL: {}", self.load.url))?;

        let body = match (&self.load.body, self.load.method.has_body()) {
            (Some(path), true) => Some(RequestBody {
                path: path.clone(),
                content_type: self.load.content_type.clone(),
            }),
            (None, true) => anyhow::bail!(
                "{} load requires a request body file (load.body)",
                self.load.method
            ),
            (_, false) => None,
        };

        Ok(LoadPlan {
            requests: self.load.requests,
            target,
            method: self.load.method,
            body,
        })
    }

    pub fn materializer(&self) -> ConfigMaterializer {
        let dir = self
            .server
            .config_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        ConfigMaterializer::new(self.template.clone(), dir, self.server.config_prefix.clone())
    }

    pub fn load_generator(&self) -> Result<ApacheBench> {
        let timeout = self
            .load
            .timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .context("Invalid load generator timeout")?;
        Ok(ApacheBench::new(self.load.program.clone(), timeout))
    }

    pub fn to_setup(&self) -> Result<ExperimentSetup> {
        let shutdown_grace = parse_duration(&self.server.shutdown_timeout).with_context(|| {
            format!("Invalid shutdown timeout '{}'", self.server.shutdown_timeout)
        })?;

        Ok(ExperimentSetup {
            name: self.name.clone(),
            materializer: self.materializer(),
            server: ServerLifecycle {
                command: ServerCommand {
                    program: self.server.binary.clone(),
                    args: self.server.args.clone(),
                    log: self.server.log.clone(),
                },
                readiness: self.readiness()?,
                shutdown_grace,
            },
            load: self.load_plan()?,
            sweep: Sweep {
                parameters: self.sweep.server_threads.clone(),
                concurrency: self.sweep.concurrency.clone(),
                repeats: self.sweep.repeats,
            },
        })
    }
}
