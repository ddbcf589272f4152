//! The dispatcher context: one explicit bundle of everything the discovery
//! loop and the worker pools share, built once at startup.

use crate::cleanup::CleanupSweeper;
use crate::discovery::DiscoveryScheduler;
use crate::layout::PivotLayout;
use crate::nightly::{NightlyGate, StateFile};
use crate::queue::DedupQueue;
use crate::vcs::SharedVcs;
use crate::worker::{BuildEnvironment, WorkerPool};
use buildqueue_config::Settings;
use buildqueue_core::{BuildExecutor, Platform, VersionControlClient};
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Dispatcher {
    queues: Vec<Arc<DedupQueue>>,
    vcs: SharedVcs,
    executor: Arc<dyn BuildExecutor>,
    environment: Arc<BuildEnvironment>,
    workers_per_platform: usize,
    poll_interval: Duration,
    discovery: DiscoveryScheduler,
}

impl Dispatcher {
    /// Build the dispatcher using the host's local time for nightly windows.
    pub fn new(
        settings: &Settings,
        vcs: Box<dyn VersionControlClient>,
        executor: Arc<dyn BuildExecutor>,
    ) -> Self {
        let offset = Local::now().offset().fix();
        Self::with_clock(settings, vcs, executor, offset, Utc::now())
    }

    /// Build the dispatcher with an explicit UTC offset and startup time.
    pub fn with_clock(
        settings: &Settings,
        vcs: Box<dyn VersionControlClient>,
        executor: Arc<dyn BuildExecutor>,
        offset: FixedOffset,
        now: DateTime<Utc>,
    ) -> Self {
        let general = &settings.general;
        let layout = PivotLayout::new(&general.pivot_directory);
        let vcs = SharedVcs::new(vcs);

        let queues: Vec<Arc<DedupQueue>> = general
            .platforms
            .iter()
            .map(|platform| Arc::new(DedupQueue::new(platform.clone(), general.queue_capacity)))
            .collect();

        let gate = NightlyGate::open(
            StateFile::new(&general.state_file),
            general.nightly_time,
            offset,
            now,
        );

        let discovery = DiscoveryScheduler::new(
            vcs.clone(),
            queues.clone(),
            gate,
            CleanupSweeper::new(layout.clone()),
        );

        let environment = Arc::new(BuildEnvironment {
            layout,
            build_script: general.build_script.clone(),
            repository_location: settings.subversion.location(),
        });

        Self {
            queues,
            vcs,
            executor,
            environment,
            workers_per_platform: general.workers_per_platform,
            poll_interval: general.poll_interval,
            discovery,
        }
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.queues.iter().map(|q| q.platform().clone()).collect()
    }

    pub fn queues(&self) -> &[Arc<DedupQueue>] {
        &self.queues
    }

    /// Run discovery and all worker pools until `shutdown` is cancelled.
    ///
    /// On shutdown discovery finishes its current cycle, every queue wakes
    /// its idle workers, and running builds complete before this returns.
    pub async fn run(self, shutdown: CancellationToken) {
        let Dispatcher {
            queues,
            vcs,
            executor,
            environment,
            workers_per_platform,
            poll_interval,
            discovery,
        } = self;

        let pools: Vec<WorkerPool> = queues
            .iter()
            .map(|queue| {
                WorkerPool::spawn(
                    queue.clone(),
                    vcs.clone(),
                    executor.clone(),
                    environment.clone(),
                    workers_per_platform,
                )
            })
            .collect();
        info!(
            platforms = pools.len(),
            workers_per_platform,
            executor = executor.name(),
            "Dispatcher started"
        );

        discovery.run(poll_interval, shutdown).await;

        for queue in &queues {
            queue.shutdown();
        }
        futures::future::join_all(pools.into_iter().map(WorkerPool::join)).await;

        info!("Dispatcher stopped");
    }
}
