//! CLI command implementations.

pub mod run;

use anyhow::{Context, Result};
use buildqueue_config::expand::expand_path;
use buildqueue_config::{load_settings, write_example};
use std::path::{Path, PathBuf};

const DEFAULT_EXAMPLE_PATH: &str = "~/buildqueue.example.kdl";

pub fn init(output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| expand_path(DEFAULT_EXAMPLE_PATH));
    write_example(&path)
        .with_context(|| format!("Failed to write example configuration: {}", path.display()))?;
    println!("Example configuration written to {}", path.display());
    Ok(())
}

pub fn validate(path: Option<&Path>) -> Result<()> {
    match load_settings(path) {
        Ok((settings, files)) => {
            for file in &files {
                println!("Read {}", file.display());
            }
            let platforms: Vec<_> = settings
                .general
                .platforms
                .iter()
                .map(|p| p.to_string())
                .collect();
            println!("Configuration is valid");
            println!("  repository: {}", settings.subversion.repository);
            println!("  platforms:  {}", platforms.join(", "));
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}
