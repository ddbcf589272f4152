//! Exclusive access to the version-control client.
//!
//! The client is not reentrant. Discovery and every worker of every platform
//! share one [`SharedVcs`], and each call holds its lock for the full
//! duration of the call, so at most one VCS operation is in flight in the
//! whole process.

use buildqueue_core::{BranchInfo, CommitInfo, VcsError, VersionControlClient};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct SharedVcs {
    kind: &'static str,
    client: Arc<Mutex<Box<dyn VersionControlClient>>>,
}

impl SharedVcs {
    pub fn new(client: Box<dyn VersionControlClient>) -> Self {
        Self {
            kind: client.kind(),
            client: Arc::new(Mutex::new(client)),
        }
    }

    /// Backend name, e.g. `svn`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub async fn list_branches(&self) -> Result<Vec<BranchInfo>, VcsError> {
        let client = self.client.lock().await;
        client.list_branches().await
    }

    pub async fn last_commit_info(&self, path: &str) -> Result<CommitInfo, VcsError> {
        let client = self.client.lock().await;
        client.last_commit_info(path).await
    }

    pub async fn export_file(&self, source: &str, destination: &Path) -> Result<(), VcsError> {
        let client = self.client.lock().await;
        client.export_file(source, destination).await
    }
}

impl std::fmt::Debug for SharedVcs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedVcs").field("kind", &self.kind).finish()
    }
}
