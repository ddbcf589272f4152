//! Build executor trait and invocation types.
//!
//! Executors run the exported build script as an external process and report
//! how it ended. They impose no timeout of their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{BuildKind, ExecutorError, Platform};

/// The fixed parameter set handed to every build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Exported build script to run.
    pub script: PathBuf,
    pub platform: Platform,
    pub branch: String,
    /// Repository location without its URL scheme, e.g. `svn.example.com/project`.
    pub repository_location: String,
    /// Repository backend, e.g. `svn`.
    pub repository_kind: String,
    pub build_kind: BuildKind,
}

/// How a build process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildOutcome {
    /// Process exited with this status code.
    Exited(i32),
    /// Process was terminated by this signal.
    Signaled(i32),
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Exited(0))
    }
}

impl std::fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildOutcome::Exited(code) => write!(f, "exit status {}", code),
            BuildOutcome::Signaled(signal) => write!(f, "terminated by signal {}", signal),
        }
    }
}

/// Trait for build executors.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Run one build to completion.
    async fn run(&self, request: &BuildRequest) -> Result<BuildOutcome, ExecutorError>;
}
