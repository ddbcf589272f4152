//! Periodic branch discovery.

use crate::cleanup::CleanupSweeper;
use crate::error::{DispatchError, QueueError};
use crate::nightly::NightlyGate;
use crate::queue::{DedupQueue, Enqueued};
use crate::vcs::SharedVcs;
use buildqueue_core::{BuildDescriptor, BuildKind, TRUNK};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one discovery cycle did, summed over all platforms.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Branches found, excluding trunk.
    pub branches: usize,
    pub admitted: usize,
    /// Pending builds raised to a higher-ranked kind.
    pub upgraded: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub nightly: bool,
    pub removed: usize,
}

/// Discovers branches and feeds every platform queue.
pub struct DiscoveryScheduler {
    vcs: SharedVcs,
    queues: Vec<Arc<DedupQueue>>,
    gate: NightlyGate,
    sweeper: CleanupSweeper,
}

impl DiscoveryScheduler {
    pub fn new(
        vcs: SharedVcs,
        queues: Vec<Arc<DedupQueue>>,
        gate: NightlyGate,
        sweeper: CleanupSweeper,
    ) -> Self {
        Self {
            vcs,
            queues,
            gate,
            sweeper,
        }
    }

    /// Run cycles every `period` until `shutdown` is cancelled.
    ///
    /// A failed cycle is logged and retried on the next tick. A cycle in
    /// progress when shutdown arrives is completed first.
    pub async fn run(mut self, period: Duration, shutdown: CancellationToken) {
        info!(period_secs = period.as_secs(), "Starting discovery");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.run_cycle(Utc::now()).await {
                Ok(report) => debug!(?report, "Discovery cycle finished"),
                Err(e) => warn!(error = %e, "Discovery cycle aborted, retrying next tick"),
            }
        }

        info!("Discovery stopped");
    }

    /// One discovery cycle at time `now`.
    ///
    /// Fails only when the version-control client does; nothing is enqueued
    /// in that case.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<CycleReport, DispatchError> {
        let trunk = self.vcs.last_commit_info(&format!("/{}", TRUNK)).await?;
        let branches = self.vcs.list_branches().await?;

        let mut report = CycleReport {
            branches: branches.len(),
            ..CycleReport::default()
        };

        // Nightly goes first so that, on a shared branch name, it is the
        // experimental trunk build that gets de-duplicated away. A pending
        // experimental trunk is upgraded in place.
        if self.gate.is_due(now) {
            let nightly = BuildDescriptor::trunk(&trunk.author, BuildKind::Nightly);
            let accepted = self.enqueue_all(&nightly, &mut report);
            if accepted == 0 {
                warn!("No platform accepted the nightly build, deferring to next cycle");
            } else {
                self.gate.record_fire(now);
                report.nightly = true;
                if accepted < self.queues.len() {
                    warn!(
                        accepted,
                        platforms = self.queues.len(),
                        "Nightly build not queued on every platform"
                    );
                }
                info!("Inserted nightly");
            }
        }

        self.enqueue_all(
            &BuildDescriptor::trunk(&trunk.author, BuildKind::Experimental),
            &mut report,
        );

        for branch in &branches {
            debug!(
                branch = %branch.name,
                revision = branch.created_revision,
                "Found branch"
            );
            let build = BuildDescriptor::new(
                &branch.name,
                &branch.source_path,
                &branch.last_author,
                BuildKind::Experimental,
            );
            self.enqueue_all(&build, &mut report);
        }

        let live: HashSet<String> = branches.into_iter().map(|b| b.name).collect();
        for queue in &self.queues {
            let sweep = self.sweeper.sweep(queue.platform(), &live).await;
            report.removed += sweep.removed.len();
        }

        Ok(report)
    }

    /// Offer `build` to every platform queue. Returns how many took it, either
    /// as a new entry or as an upgrade of a pending one.
    fn enqueue_all(&self, build: &BuildDescriptor, report: &mut CycleReport) -> usize {
        let mut accepted = 0;
        for queue in &self.queues {
            match queue.enqueue(build.clone()) {
                Ok(Enqueued::Admitted) => {
                    accepted += 1;
                    report.admitted += 1;
                }
                Ok(Enqueued::Upgraded) => {
                    accepted += 1;
                    report.upgraded += 1;
                }
                Ok(Enqueued::Duplicate) => report.duplicates += 1,
                Err(e @ QueueError::Full { .. }) => {
                    warn!(branch = %build.name, error = %e, "Queue full, skipping");
                    report.rejected += 1;
                }
                Err(QueueError::Closed(_)) => report.rejected += 1,
            }
        }
        accepted
    }
}
