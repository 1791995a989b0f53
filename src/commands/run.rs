use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::warn;

use crate::config::{ExperimentConfig, UserConfig};
use crate::harness::ExperimentController;
use crate::parser::load_experiments;
use crate::report::ReportGenerator;
use crate::ui::SweepProgress;
use crate::utils::parse_levels;

pub struct RunOptions {
    pub target: PathBuf,
    pub threads: Option<String>,
    pub concurrency: Option<String>,
    pub repeats: Option<u32>,
    pub requests: Option<u32>,
    pub url: Option<String>,
    pub server: Option<PathBuf>,
    pub report: Option<String>,
    pub output: Option<PathBuf>,
    pub ci: bool,
}

impl RunOptions {
    /// Command line flags win over the experiment file.
    pub fn apply_overrides(&self, config: &mut ExperimentConfig) -> Result<()> {
        if let Some(threads) = &self.threads {
            config.sweep.server_threads =
                parse_levels(threads).context("Invalid --threads list")?;
        }
        if let Some(concurrency) = &self.concurrency {
            config.sweep.concurrency =
                parse_levels(concurrency).context("Invalid --concurrency list")?;
        }
        if let Some(repeats) = self.repeats {
            config.sweep.repeats = repeats;
        }
        if let Some(requests) = self.requests {
            config.load.requests = requests;
        }
        if let Some(url) = &self.url {
            config.load.url = url.clone();
        }
        if let Some(server) = &self.server {
            config.server.binary = server.clone();
        }
        Ok(())
    }
}

pub async fn handle_run(options: RunOptions) -> Result<()> {
    let experiments = load_experiments(&options.target)
        .await
        .context("Failed to load experiment definitions")?;

    let user_config = UserConfig::load().unwrap_or_else(|err| {
        warn!(error = %err, "could not load user config, using defaults");
        UserConfig::default()
    });
    let formats = options
        .report
        .clone()
        .unwrap_or_else(|| user_config.reports.default_formats.join(","));
    let output_dir = options
        .output
        .clone()
        .unwrap_or_else(|| user_config.reports.output_dir.clone());

    for (file_name, mut config) in experiments {
        options.apply_overrides(&mut config)?;

        let setup = config
            .to_setup()
            .with_context(|| format!("Invalid experiment in {}", file_name))?;
        let generator = config.load_generator()?;

        println!();
        if options.ci {
            println!("RUN {}", config.name);
        } else {
            println!("{} {}", "RUN".cyan().bold(), config.name.bright_white());
        }
        println!(
            "Server: {}",
            config.server.binary.display().to_string().bright_white()
        );
        println!("Target: {} {}", config.load.method, config.load.url.bright_white());
        println!(
            "Threads: {:?}  Concurrency: {:?}  Repeats: {}",
            config.sweep.server_threads, config.sweep.concurrency, config.sweep.repeats
        );

        let controller = ExperimentController::new(setup, generator);
        let progress = SweepProgress::new(controller.sweep().total_trials(), options.ci);
        let outcome = controller.run(&progress).await;
        progress.finish();

        let result =
            outcome.with_context(|| format!("Experiment '{}' aborted", config.name))?;

        println!();
        println!("{} Sweep completed", "✔".green().bold());
        ReportGenerator::print_summary(&result, options.ci);

        let generated = ReportGenerator::generate_reports(&result, &formats, &output_dir)?;
        for path in generated {
            println!("Report written to: {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RunOptions {
        RunOptions {
            target: PathBuf::from("experiment.sweep.yaml"),
            threads: None,
            concurrency: None,
            repeats: None,
            requests: None,
            url: None,
            server: None,
            report: None,
            output: None,
            ci: true,
        }
    }

    #[test]
    fn test_no_overrides_keep_file_values() {
        let mut config = ExperimentConfig::sample("keep");
        options().apply_overrides(&mut config).unwrap();
        assert_eq!(config.sweep.server_threads, vec![1, 10, 20, 50]);
        assert_eq!(config.load.requests, 1000);
    }

    #[test]
    fn test_overrides_replace_sweep() {
        let mut config = ExperimentConfig::sample("override");
        let opts = RunOptions {
            threads: Some("1,10".to_string()),
            concurrency: Some("5-10:5".to_string()),
            repeats: Some(5),
            requests: Some(200),
            url: Some("http://127.0.0.1:9000/get".to_string()),
            server: Some(PathBuf::from("/opt/server")),
            ..options()
        };
        opts.apply_overrides(&mut config).unwrap();

        assert_eq!(config.sweep.server_threads, vec![1, 10]);
        assert_eq!(config.sweep.concurrency, vec![5, 10]);
        assert_eq!(config.sweep.repeats, 5);
        assert_eq!(config.load.requests, 200);
        assert_eq!(config.load.url, "http://127.0.0.1:9000/get");
        assert_eq!(config.server.binary, PathBuf::from("/opt/server"));
    }

    #[test]
    fn test_bad_override_is_error() {
        let mut config = ExperimentConfig::sample("bad");
        let opts = RunOptions {
            threads: Some("many".to_string()),
            ..options()
        };
        assert!(opts.apply_overrides(&mut config).is_err());
    }
}
