//! Error types for dispatching.

use buildqueue_core::{ExecutorError, Platform, VcsError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("{platform} queue full ({capacity} pending)")]
    Full { platform: Platform, capacity: usize },

    #[error("{0} queue is shut down")]
    Closed(Platform),
}

/// Failure reading or writing persisted nightly state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed state: {0}")]
    Format(#[from] serde_json::Error),
}

/// Failures scoped to one discovery cycle or one branch build.
///
/// None of these terminate the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("version control: {0}")]
    Vcs(#[from] VcsError),

    #[error("executor: {0}")]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("build script for {branch} is not a server build script")]
    Incompatible { branch: String },

    #[error("failed to remove {}: {source}", .path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("nightly state: {0}")]
    State(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
