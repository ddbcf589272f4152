//! De-duplicating build queue.
//!
//! One queue per platform. A branch name stays a member of the queue from
//! the moment it is admitted until the worker that dequeued it calls
//! [`DedupQueue::release`], so a branch is never queued twice and never
//! re-admitted while its build is still running.

use crate::error::QueueError;
use buildqueue_core::{BuildDescriptor, Platform};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tracing::debug;

/// Result of a successful enqueue call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// The build was added to the queue.
    Admitted,
    /// A pending build for the same branch was raised to this build's kind.
    Upgraded,
    /// A build for the same branch is already pending or in flight.
    Duplicate,
}

/// A pending build with its ordering key.
#[derive(Debug)]
struct PendingBuild {
    rank: u8,
    seq: u64,
    build: BuildDescriptor,
}

impl Ord for PendingBuild {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher rank first, then lower sequence number first.
        self.rank
            .cmp(&other.rank)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for PendingBuild {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for PendingBuild {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingBuild {}

#[derive(Debug, Default)]
struct QueueState {
    pending: BinaryHeap<PendingBuild>,
    /// Names pending or dequeued-but-not-released.
    members: HashSet<String>,
    next_seq: u64,
    closed: bool,
}

/// Bounded priority queue keyed by branch name.
///
/// The pending heap and the membership set share one lock, held only for
/// bookkeeping and never across a build.
#[derive(Debug)]
pub struct DedupQueue {
    platform: Platform,
    capacity: usize,
    state: Mutex<QueueState>,
    available: Notify,
}

impl DedupQueue {
    pub fn new(platform: Platform, capacity: usize) -> Self {
        Self {
            platform,
            capacity,
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit a build unless its branch is already a member.
    ///
    /// A pending build of the same branch with a lower-ranked kind takes
    /// over the new kind in place; membership does not change. Never blocks. Fails with [`QueueError::Full`] when `capacity` builds
    /// are already pending and with [`QueueError::Closed`] after shutdown.
    pub fn enqueue(&self, build: BuildDescriptor) -> Result<Enqueued, QueueError> {
        let mut state = self.lock();

        if state.closed {
            return Err(QueueError::Closed(self.platform.clone()));
        }

        if state.members.contains(&build.name) {
            if upgrade_pending(&mut state.pending, &build) {
                debug!(
                    platform = %self.platform,
                    branch = %build.name,
                    kind = %build.kind,
                    "Upgraded pending build"
                );
                return Ok(Enqueued::Upgraded);
            }
            debug!(
                platform = %self.platform,
                branch = %build.name,
                "Branch already queued or building, skipping"
            );
            return Ok(Enqueued::Duplicate);
        }

        if state.pending.len() >= self.capacity {
            return Err(QueueError::Full {
                platform: self.platform.clone(),
                capacity: self.capacity,
            });
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.members.insert(build.name.clone());
        state.pending.push(PendingBuild {
            rank: build.kind.rank(),
            seq,
            build,
        });
        drop(state);

        self.available.notify_one();
        Ok(Enqueued::Admitted)
    }

    /// Wait for the highest-priority pending build.
    ///
    /// Returns `None` once the queue is shut down, even if builds are still
    /// pending. The returned branch stays reserved until [`release`](Self::release).
    pub async fn dequeue(&self) -> Option<BuildDescriptor> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent enqueue or shutdown cannot be missed.
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if let Some(next) = state.pending.pop() {
                    let more = !state.pending.is_empty();
                    drop(state);
                    if more {
                        self.available.notify_one();
                    }
                    return Some(next.build);
                }
            }

            notified.await;
        }
    }

    /// Release a dequeued branch so it may be admitted again.
    ///
    /// Returns whether the name was a member.
    pub fn release(&self, name: &str) -> bool {
        self.lock().members.remove(name)
    }

    /// Stop accepting builds and wake every waiting worker.
    pub fn shutdown(&self) {
        self.lock().closed = true;
        self.available.notify_waiters();
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().closed
    }

    /// Whether `name` is pending or in flight.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().members.contains(name)
    }

    /// Number of pending builds.
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Branch names of pending builds in dequeue order.
    pub fn pending_names(&self) -> Vec<String> {
        let state = self.lock();
        let mut pending: Vec<&PendingBuild> = state.pending.iter().collect();
        pending.sort_by(|a, b| b.cmp(a));
        pending.iter().map(|p| p.build.name.clone()).collect()
    }
}

/// Raise a pending build of the same branch to `build`'s kind if it ranks lower.
fn upgrade_pending(pending: &mut BinaryHeap<PendingBuild>, build: &BuildDescriptor) -> bool {
    let rank = build.kind.rank();
    if !pending
        .iter()
        .any(|p| p.build.name == build.name && p.rank < rank)
    {
        return false;
    }

    let mut entries = std::mem::take(pending).into_vec();
    for entry in entries.iter_mut().filter(|p| p.build.name == build.name) {
        entry.rank = rank;
        entry.build = build.clone();
    }
    *pending = BinaryHeap::from(entries);
    true
}
