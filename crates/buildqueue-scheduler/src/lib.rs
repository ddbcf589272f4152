//! Build scheduling for buildqueue.
//!
//! Discovers branches in the repository, keeps one de-duplicating queue per
//! platform and drains each queue with a fixed pool of workers. A nightly
//! trunk build is injected once a day and build directories of deleted
//! branches are swept after every discovery cycle.

pub mod cleanup;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod layout;
pub mod nightly;
pub mod queue;
pub mod vcs;
pub mod worker;

#[cfg(test)]
mod testing;

pub use cleanup::{CleanupSweeper, SweepReport};
pub use discovery::{CycleReport, DiscoveryScheduler};
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, QueueError, StateError};
pub use layout::PivotLayout;
pub use nightly::{NightlyGate, NightlyState, StateFile};
pub use queue::{DedupQueue, Enqueued};
pub use vcs::SharedVcs;
pub use worker::{BuildEnvironment, SERVER_BUILD_MARKER, Worker, WorkerPool};
