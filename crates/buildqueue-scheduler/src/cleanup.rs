//! Removal of build directories for branches that no longer exist.

use crate::error::DispatchError;
use crate::layout::PivotLayout;
use buildqueue_core::{Platform, TRUNK};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// What one sweep of one platform did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CleanupSweeper {
    layout: PivotLayout,
}

impl CleanupSweeper {
    pub fn new(layout: PivotLayout) -> Self {
        Self { layout }
    }

    /// Remove every directory in the platform's build directory whose name is
    /// neither trunk nor in `live`.
    ///
    /// A failed removal is logged and does not stop the sweep.
    pub async fn sweep(&self, platform: &Platform, live: &HashSet<String>) -> SweepReport {
        let build_dir = self.layout.build_dir(platform);
        let mut report = SweepReport::default();

        let stale = match stale_directories(&build_dir, live).await {
            Ok(stale) => stale,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(platform = %platform, path = %build_dir.display(), "No build directory yet");
                return report;
            }
            Err(e) => {
                warn!(platform = %platform, path = %build_dir.display(), error = %e, "Could not list build directory");
                return report;
            }
        };

        for name in stale {
            let path = build_dir.join(&name);
            info!(platform = %platform, path = %path.display(), "Removing build directory of deleted branch");
            match remove(&path).await {
                Ok(()) => report.removed.push(name),
                Err(e) => {
                    warn!(platform = %platform, error = %e, "Failed to remove build directory");
                    report.failed.push(name);
                }
            }
        }

        report
    }
}

async fn stale_directories(
    build_dir: &Path,
    live: &HashSet<String>,
) -> std::io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(build_dir).await?;
    let mut stale = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == TRUNK || live.contains(&name) {
            continue;
        }
        stale.push(name);
    }

    stale.sort();
    Ok(stale)
}

async fn remove(path: &Path) -> Result<(), DispatchError> {
    tokio::fs::remove_dir_all(path)
        .await
        .map_err(|source| DispatchError::Cleanup {
            path: path.to_path_buf(),
            source,
        })
}
