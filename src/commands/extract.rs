use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

use crate::harness::extract_throughput;

/// Reads a saved load generator report (`-` for stdin) and prints its
/// throughput.
pub async fn handle_extract(input: PathBuf) -> Result<()> {
    let raw = if input.as_os_str() == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read report from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&input)
            .await
            .with_context(|| format!("Failed to read file: {}", input.display()))?
    };

    let throughput = extract_throughput(&raw)?;
    println!("{} {:.2} req/s", "✔".green(), throughput);
    Ok(())
}
