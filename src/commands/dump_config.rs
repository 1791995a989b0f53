use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::config::ExperimentConfig;
use crate::parser::load_experiments;

pub struct DumpConfigOptions {
    pub parameter: u32,
    pub experiment: Option<PathBuf>,
    pub write: bool,
}

/// Shows the server configuration a sweep would write for `parameter`.
pub async fn handle_dump_config(options: DumpConfigOptions) -> Result<()> {
    let config = match &options.experiment {
        Some(path) => {
            let mut experiments = load_experiments(path).await?;
            experiments.remove(0).1
        }
        None => ExperimentConfig::sample("dump"),
    };
    let materializer = config.materializer();

    if options.write {
        let handle = materializer.materialize(options.parameter).await?;
        eprintln!(
            "{} Wrote {}",
            "✔".green(),
            handle.path.display().to_string().bright_white()
        );
    }
    println!("{}", materializer.render(options.parameter)?);
    Ok(())
}
