use crate::config::ExperimentConfig;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

/// Loads one experiment file, or every `*.sweep.yaml` under a directory.
pub async fn load_experiments(path: &Path) -> Result<Vec<(String, ExperimentConfig)>> {
    if path.is_file() {
        let config = load_single_file(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        Ok(vec![(file_name, config)])
    } else if path.is_dir() {
        load_directory(path).await
    } else {
        anyhow::bail!("Path does not exist: {}", path.display());
    }
}

async fn load_single_file(path: &Path) -> Result<ExperimentConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let config: ExperimentConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML in file: {}", path.display()))?;

    Ok(config)
}

async fn load_directory(path: &Path) -> Result<Vec<(String, ExperimentConfig)>> {
    let mut configs = Vec::new();

    for entry in WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|name| name.ends_with(".sweep.yaml") || name.ends_with(".sweep.yml"))
                .unwrap_or(false)
        })
    {
        let config = load_single_file(entry.path()).await?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        configs.push((file_name, config));
    }

    if configs.is_empty() {
        anyhow::bail!(
            "No .sweep.yaml files found in directory: {}",
            path.display()
        );
    }

    // experiments run in file name order
    configs.sort_by(|a, b| a.0.cmp(&b.0));

    Ok(configs)
}
