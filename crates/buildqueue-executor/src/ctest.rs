//! CTest executor implementation.

use async_trait::async_trait;
use buildqueue_core::executor::{BuildExecutor, BuildOutcome, BuildRequest};
use buildqueue_core::ExecutorError;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs the exported build script with `ctest --script`.
///
/// The build parameters are appended to the script argument, separated by
/// `;`, in the form the stage-2 scripts parse:
/// `<script>,platform=<p>;branch=<b>;repo=<r>;repotype=<k>;server;<kind>`.
pub struct CtestExecutor {
    program: String,
}

impl CtestExecutor {
    pub fn new() -> Self {
        Self {
            program: "ctest".to_string(),
        }
    }

    /// Use a different `ctest` binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// The `--script` argument for a request.
    pub fn script_argument(request: &BuildRequest) -> String {
        format!(
            "{},platform={};branch={};repo={};repotype={};server;{}",
            request.script.display(),
            request.platform,
            request.branch,
            request.repository_location,
            request.repository_kind,
            request.build_kind,
        )
    }
}

impl Default for CtestExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BuildExecutor for CtestExecutor {
    fn name(&self) -> &'static str {
        "ctest"
    }

    async fn run(&self, request: &BuildRequest) -> Result<BuildOutcome, ExecutorError> {
        let argument = Self::script_argument(request);
        debug!(program = %self.program, argument = %argument, "Spawning build");
        info!(platform = %request.platform, branch = %request.branch, kind = %request.build_kind, "Starting build");

        let status = Command::new(&self.program)
            .arg("--script")
            .arg(&argument)
            .status()
            .await
            .map_err(|source| ExecutorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        Ok(outcome_of(status))
    }
}

#[cfg(unix)]
fn outcome_of(status: std::process::ExitStatus) -> BuildOutcome {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => BuildOutcome::Exited(code),
        (None, Some(signal)) => BuildOutcome::Signaled(signal),
        (None, None) => BuildOutcome::Exited(-1),
    }
}

#[cfg(not(unix))]
fn outcome_of(status: std::process::ExitStatus) -> BuildOutcome {
    BuildOutcome::Exited(status.code().unwrap_or(-1))
}
