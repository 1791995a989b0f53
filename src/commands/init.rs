use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

use crate::config::ExperimentConfig;

pub async fn handle_init(path: PathBuf, name: String, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    let yaml = serde_yaml::to_string(&ExperimentConfig::sample(&name))?;
    tokio::fs::write(&path, yaml)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "{} Created {}",
        "✔".green(),
        path.display().to_string().bright_white()
    );
    println!("Run it with: sweepbench run {}", path.display());
    Ok(())
}
