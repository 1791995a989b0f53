use crate::error::{HarnessError, Result};
use crate::harness::metric::extract_throughput;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn has_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
        }
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            other => Err(format!("Unsupported method '{}'. Use: GET, POST, PUT", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    pub path: PathBuf,
    pub content_type: String,
}

/// One load generator invocation.
#[derive(Debug, Clone)]
pub struct Trial {
    pub requests: u32,
    pub concurrency: u32,
    pub target: Url,
    pub method: HttpMethod,
    pub body: Option<RequestBody>,
}

/// Everything about a trial except its concurrency, which the sweep supplies.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub requests: u32,
    pub target: Url,
    pub method: HttpMethod,
    pub body: Option<RequestBody>,
}

impl LoadPlan {
    pub fn trial(&self, concurrency: u32) -> Trial {
        Trial {
            requests: self.requests,
            concurrency,
            target: self.target.clone(),
            method: self.method,
            body: self.body.clone(),
        }
    }
}

/// Produces the raw textual report for one trial.
#[allow(async_fn_in_trait)]
pub trait LoadGenerator {
    async fn generate(&self, trial: &Trial) -> Result<String>;
}

/// Drives ApacheBench (or anything accepting its flags).
#[derive(Debug, Clone)]
pub struct ApacheBench {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl ApacheBench {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn args(trial: &Trial) -> Vec<String> {
        let mut args = vec![
            "-n".to_string(),
            trial.requests.to_string(),
            "-c".to_string(),
            trial.concurrency.to_string(),
        ];

        if trial.method.has_body() {
            if let Some(body) = &trial.body {
                args.push("-T".to_string());
                args.push(body.content_type.clone());
                args.push(if trial.method == HttpMethod::Put { "-u" } else { "-p" }.to_string());
                args.push(body.path.display().to_string());
            }
        }

        args.push(trial.target.to_string());
        args
    }
}

impl LoadGenerator for ApacheBench {
    async fn generate(&self, trial: &Trial) -> Result<String> {
        let args = Self::args(trial);
        debug!(program = %self.program.display(), ?args, "spawning load generator");

        let mut cmd = Command::new(&self.program);
        cmd.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let spawn_error = |source| HarnessError::ProcessSpawn {
            program: self.program.display().to_string(),
            source,
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| HarnessError::TrialTimedOut { waited: limit })?
                .map_err(spawn_error)?,
            None => cmd.output().await.map_err(spawn_error)?,
        };

        if !output.status.success() {
            debug!(status = %output.status, "load generator exited with failure");
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

pub struct TrialRunner<G> {
    generator: G,
}

impl<G: LoadGenerator> TrialRunner<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    /// Runs one trial to completion and returns its requests/second.
    pub async fn run_trial(&self, trial: &Trial) -> Result<f64> {
        let raw = self.generator.generate(trial).await?;

        match extract_throughput(&raw) {
            Ok(throughput) => {
                debug!(concurrency = trial.concurrency, throughput, "trial finished");
                Ok(throughput)
            }
            Err(err) => {
                error!(
                    concurrency = trial.concurrency,
                    target = %trial.target,
                    output = %raw,
                    "load generator report has no throughput line"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn post_trial() -> Trial {
        Trial {
            requests: 1000,
            concurrency: 10,
            target: Url::parse("http://127.0.0.1:4096/set").unwrap(),
            method: HttpMethod::Post,
            body: Some(RequestBody {
                path: PathBuf::from("a.json"),
                content_type: "application/json".to_string(),
            }),
        }
    }

    struct Canned {
        outputs: RefCell<Vec<String>>,
    }

    impl LoadGenerator for Canned {
        async fn generate(&self, _trial: &Trial) -> Result<String> {
            Ok(self.outputs.borrow_mut().remove(0))
        }
    }

    #[test]
    fn test_post_args_include_body() {
        let args = ApacheBench::args(&post_trial());
        assert_eq!(
            args,
            vec![
                "-n",
                "1000",
                "-c",
                "10",
                "-T",
                "application/json",
                "-p",
                "a.json",
                "http://127.0.0.1:4096/set"
            ]
        );
    }

    #[test]
    fn test_get_args_skip_body() {
        let mut trial = post_trial();
        trial.method = HttpMethod::Get;
        let args = ApacheBench::args(&trial);
        assert_eq!(args, vec!["-n", "1000", "-c", "10", "http://127.0.0.1:4096/set"]);
    }

    #[test]
    fn test_put_uses_upload_flag() {
        let mut trial = post_trial();
        trial.method = HttpMethod::Put;
        let args = ApacheBench::args(&trial);
        assert!(args.contains(&"-u".to_string()));
        assert!(!args.contains(&"-p".to_string()));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("DELETE".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Put.to_string(), "PUT");
    }

    #[test]
    fn test_load_plan_only_varies_concurrency() {
        let plan = LoadPlan {
            requests: 500,
            target: Url::parse("http://localhost:8080/hello").unwrap(),
            method: HttpMethod::Get,
            body: None,
        };
        let trial = plan.trial(42);
        assert_eq!(trial.concurrency, 42);
        assert_eq!(trial.requests, 500);
        assert_eq!(trial.target.as_str(), "http://localhost:8080/hello");
    }

    #[tokio::test]
    async fn test_run_trial_extracts_throughput() {
        let runner = TrialRunner::new(Canned {
            outputs: RefCell::new(vec![
                "Requests per second:    812.33 [#/sec] (mean)\n".to_string(),
            ]),
        });
        assert_eq!(runner.run_trial(&post_trial()).await.unwrap(), 812.33);
    }

    #[tokio::test]
    async fn test_run_trial_propagates_metric_not_found() {
        let runner = TrialRunner::new(Canned {
            outputs: RefCell::new(vec!["socket: Too many open files (24)\n".to_string()]),
        });
        let err = runner.run_trial(&post_trial()).await.unwrap_err();
        match err {
            HarnessError::MetricNotFound { output } => {
                assert_eq!(output, "socket: Too many open files (24)\n")
            }
            other => panic!("expected MetricNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let ab = ApacheBench::new("/nonexistent/definitely-not-ab", None);
        let err = ab.generate(&post_trial()).await.unwrap_err();
        assert!(matches!(err, HarnessError::ProcessSpawn { .. }));
    }
}
