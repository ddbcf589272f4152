//! Configuration parsing errors.

use std::path::PathBuf;
use thiserror::Error;

/// Any of these at startup is fatal: the dispatcher never starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("KDL parse error: {0}")]
    Parse(#[from] kdl::KdlError),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("no configuration file found (searched: {})", format_paths(.0))]
    NotFound(Vec<PathBuf>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
