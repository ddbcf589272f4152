//! Once-per-day nightly trigger with durable state.
//!
//! Nights are fixed windows starting at a reference time of day (01:00 by
//! default). The recorded fire time is always the start of the window the
//! fire happened in, never the raw clock reading, so a restart computes the
//! same next eligible fire time as an uninterrupted process would.

use crate::error::StateError;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persisted nightly state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightlyState {
    pub last_nightly_fire: DateTime<Utc>,
}

/// JSON file holding [`NightlyState`], replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state, or `None` if no state was ever saved.
    pub fn load(&self) -> Result<Option<NightlyState>, StateError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file, then rename over the old state.
    pub fn save(&self, state: &NightlyState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Answers "is it time for a new nightly build?".
#[derive(Debug)]
pub struct NightlyGate {
    store: StateFile,
    reference: NaiveTime,
    offset: FixedOffset,
    last_fire: DateTime<Utc>,
}

impl NightlyGate {
    /// Restore the gate from `store`.
    ///
    /// With no readable state the gate starts as already fired for the
    /// current window, so startup never triggers a nightly by itself, and
    /// persists that choice.
    pub fn open(
        store: StateFile,
        reference: NaiveTime,
        offset: FixedOffset,
        now: DateTime<Utc>,
    ) -> Self {
        let restored = match store.load() {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %store.path().display(), error = %e, "Could not read nightly state, starting fresh");
                None
            }
        };

        let mut gate = Self {
            store,
            reference,
            offset,
            last_fire: now,
        };

        match restored {
            Some(state) => {
                debug!(last_fire = %state.last_nightly_fire, "Restored nightly state");
                gate.last_fire = state.last_nightly_fire;
            }
            None => {
                gate.last_fire = gate.window_start(now);
                info!(last_fire = %gate.last_fire, "No nightly state, treating today's nightly as done");
                gate.persist();
            }
        }

        gate
    }

    /// Start of the recorded nightly window.
    pub fn last_fire(&self) -> DateTime<Utc> {
        self.last_fire
    }

    /// Most recent occurrence of the reference time at or before `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = now.with_timezone(&self.offset).naive_local();
        let mut start = local.date().and_time(self.reference);
        if start > local {
            start -= Duration::days(1);
        }
        start
            .and_local_timezone(self.offset)
            .single()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now)
    }

    /// Whether more than 24 hours have passed since the last recorded window.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now - self.last_fire > Duration::hours(24)
    }

    /// Record and persist the start of the window containing `now`.
    pub fn record_fire(&mut self, now: DateTime<Utc>) {
        self.last_fire = self.window_start(now);
        self.persist();
    }

    /// Fire once more than 24 hours have passed since the last recorded window.
    ///
    /// On firing, records and persists the start of the current window.
    pub fn should_fire_nightly(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_due(now) {
            return false;
        }

        self.record_fire(now);
        true
    }

    fn persist(&self) {
        let state = NightlyState {
            last_nightly_fire: self.last_fire,
        };
        if let Err(e) = self.store.save(&state) {
            warn!(path = %self.store.path().display(), error = %e, "Could not write nightly state");
        }
    }
}
