//! Version-control client trait and listing types.
//!
//! Implementations are NOT required to be reentrant. Callers must never
//! issue two calls concurrently; the scheduler routes every call through a
//! single lock-guarded handle.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::VcsError;

/// One entry of the branch listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Last path component, e.g. `feature-x`.
    pub name: String,
    /// Path relative to the repository root, e.g. `/branches/feature-x`.
    pub source_path: String,
    pub last_author: String,
    pub created_revision: u64,
}

/// Metadata of the most recent commit under a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub author: String,
    pub revision: u64,
    pub timestamp: DateTime<Utc>,
}

/// Read-only access to the source repository.
///
/// All paths are relative to the repository root and start with `/`.
#[async_trait]
pub trait VersionControlClient: Send + Sync {
    /// Name of this backend, e.g. `svn`. Passed to the build as the repository kind.
    fn kind(&self) -> &'static str;

    /// List the branches one level below the repository's branches location.
    async fn list_branches(&self) -> Result<Vec<BranchInfo>, VcsError>;

    /// Get the most recent commit under `path`.
    async fn last_commit_info(&self, path: &str) -> Result<CommitInfo, VcsError>;

    /// Copy a single file out of version control, overwriting `destination`.
    async fn export_file(&self, source: &str, destination: &Path) -> Result<(), VcsError>;
}
