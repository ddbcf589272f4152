//! Build requests and target platforms.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Name of the main line of development. Always built, never swept.
pub const TRUNK: &str = "trunk";

/// Kind of build requested for a branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildKind {
    /// Once-per-day build of trunk.
    Nightly,
    /// Build triggered every discovery cycle for every known branch.
    Experimental,
}

impl BuildKind {
    /// Rank used to order pending builds; higher runs first.
    pub fn rank(self) -> u8 {
        match self {
            BuildKind::Nightly => 1,
            BuildKind::Experimental => 0,
        }
    }
}

impl std::fmt::Display for BuildKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildKind::Nightly => write!(f, "nightly"),
            BuildKind::Experimental => write!(f, "experimental"),
        }
    }
}

impl std::str::FromStr for BuildKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nightly" => Ok(BuildKind::Nightly),
            "experimental" => Ok(BuildKind::Experimental),
            _ => Err(format!("Unknown build kind: {}", s)),
        }
    }
}

/// A target environment, e.g. `linux-arm`.
///
/// Each platform owns one queue, one worker pool and its own directories
/// under the pivot directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct Platform(String);

impl Platform {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Platforms built on this host when none are configured.
    ///
    /// Returns an empty list for hosts without a known build matrix.
    pub fn host_defaults() -> Vec<Platform> {
        if cfg!(target_os = "linux") {
            vec![Platform::new("linux-arm"), Platform::new("linux-x86")]
        } else if cfg!(target_os = "windows") {
            vec![Platform::new("windows-x86")]
        } else {
            Vec::new()
        }
    }
}

impl From<&str> for Platform {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One build request for one branch.
///
/// Created by discovery, consumed exactly once by a worker and discarded
/// after the build attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDescriptor {
    /// Branch name; the de-duplication key.
    pub name: String,
    /// Path of the branch relative to the repository root, e.g. `/branches/feature-x`.
    pub source_path: String,
    /// Author of the most recent commit on the branch.
    pub last_author: String,
    pub kind: BuildKind,
}

impl BuildDescriptor {
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<String>,
        last_author: impl Into<String>,
        kind: BuildKind,
    ) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            last_author: last_author.into(),
            kind,
        }
    }

    /// Descriptor for the main line of development.
    pub fn trunk(last_author: impl Into<String>, kind: BuildKind) -> Self {
        Self::new(TRUNK, format!("/{}", TRUNK), last_author, kind)
    }
}
