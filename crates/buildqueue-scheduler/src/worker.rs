//! Workers that drain a platform queue and run builds.

use crate::error::DispatchError;
use crate::layout::PivotLayout;
use crate::queue::DedupQueue;
use crate::vcs::SharedVcs;
use buildqueue_core::{BuildDescriptor, BuildExecutor, BuildOutcome, BuildRequest, Platform};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Marker identifying a build script that supports server invocation.
pub const SERVER_BUILD_MARKER: &str = "SERVERBUILD";

/// Settings every worker needs to prepare and run a build.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    pub layout: PivotLayout,
    /// Build script path relative to a branch root.
    pub build_script: String,
    /// Repository location without its scheme.
    pub repository_location: String,
}

/// A worker that dequeues and builds branches for one platform.
pub struct Worker {
    id: String,
    queue: Arc<DedupQueue>,
    vcs: SharedVcs,
    executor: Arc<dyn BuildExecutor>,
    environment: Arc<BuildEnvironment>,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<DedupQueue>,
        vcs: SharedVcs,
        executor: Arc<dyn BuildExecutor>,
        environment: Arc<BuildEnvironment>,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            vcs,
            executor,
            environment,
        }
    }

    fn platform(&self) -> &Platform {
        self.queue.platform()
    }

    /// Run the worker loop until the queue shuts down.
    ///
    /// A build already running when shutdown arrives is finished first.
    pub async fn run(&self) {
        info!(worker_id = %self.id, platform = %self.platform(), "Starting worker");

        while let Some(build) = self.queue.dequeue().await {
            self.handle(&build).await;
            self.queue.release(&build.name);
        }

        info!(worker_id = %self.id, platform = %self.platform(), "Worker stopped");
    }

    /// Process one build and log how it ended. Never fails.
    async fn handle(&self, build: &BuildDescriptor) {
        let platform = self.platform();
        match self.process(build).await {
            Ok(outcome) if outcome.is_success() => {
                info!(platform = %platform, branch = %build.name, kind = %build.kind, status = %outcome, "Build completed");
            }
            Ok(outcome) => {
                warn!(platform = %platform, branch = %build.name, kind = %build.kind, status = %outcome, "Build completed");
            }
            Err(DispatchError::Incompatible { .. }) => {
                info!(platform = %platform, branch = %build.name, "Old style build script, skipping");
            }
            Err(e @ DispatchError::Executor(_)) => {
                warn!(platform = %platform, branch = %build.name, error = %e, "Build execution failed");
            }
            Err(e) => {
                warn!(platform = %platform, branch = %build.name, error = %e, "Prebuild failed");
            }
        }
    }

    /// Export the build script, check it and run it.
    pub async fn process(&self, build: &BuildDescriptor) -> Result<BuildOutcome, DispatchError> {
        let script = self.prebuild(build).await?;

        let request = BuildRequest {
            script,
            platform: self.platform().clone(),
            branch: build.name.clone(),
            repository_location: self.environment.repository_location.clone(),
            repository_kind: self.vcs.kind().to_string(),
            build_kind: build.kind,
        };

        Ok(self.executor.run(&request).await?)
    }

    /// Export the branch's build script into the platform scratch directory
    /// and verify it is a server build script.
    async fn prebuild(&self, build: &BuildDescriptor) -> Result<PathBuf, DispatchError> {
        let layout = &self.environment.layout;
        tokio::fs::create_dir_all(layout.scripts_dir(self.platform())).await?;

        let script = layout.script_path(self.platform(), &build.name);
        let source = format!(
            "{}/{}",
            build.source_path.trim_end_matches('/'),
            self.environment.build_script
        );

        self.vcs.export_file(&source, &script).await?;

        let contents = tokio::fs::read(&script).await?;
        if !has_marker(&contents) {
            return Err(DispatchError::Incompatible {
                branch: build.name.clone(),
            });
        }
        debug!(platform = %self.platform(), branch = %build.name, "Detected new style build script");

        Ok(script)
    }
}

/// Scripts are not required to be UTF-8.
fn has_marker(contents: &[u8]) -> bool {
    let marker = SERVER_BUILD_MARKER.as_bytes();
    contents.windows(marker.len()).any(|w| w == marker)
}

/// Fixed set of workers draining one platform queue.
pub struct WorkerPool {
    platform: Platform,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers on `queue`.
    pub fn spawn(
        queue: Arc<DedupQueue>,
        vcs: SharedVcs,
        executor: Arc<dyn BuildExecutor>,
        environment: Arc<BuildEnvironment>,
        size: usize,
    ) -> Self {
        let platform = queue.platform().clone();
        let handles = (0..size)
            .map(|n| {
                let worker = Worker::new(
                    format!("{}-{}", platform, n),
                    queue.clone(),
                    vcs.clone(),
                    executor.clone(),
                    environment.clone(),
                );
                tokio::spawn(async move { worker.run().await })
            })
            .collect();

        Self { platform, handles }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Wait for every worker to exit. Call after shutting down the queue.
    pub async fn join(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                warn!(platform = %self.platform, error = %e, "Worker task failed");
            }
        }
    }
}
