//! Error types for the external collaborators.

use thiserror::Error;

/// Failure talking to the version-control system.
///
/// Always treated as transient by the dispatcher: the affected cycle or
/// prebuild step is abandoned and naturally retried on the next tick.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("{command} failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("unexpected output from {command}: {message}")]
    Parse { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure starting the external build process.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}
