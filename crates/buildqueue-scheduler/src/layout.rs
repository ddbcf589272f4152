//! On-disk layout under the pivot directory.
//!
//! ```text
//! <pivot>/<platform>/buildscripts/<branch>-build-stage2.cmake
//! <pivot>/<platform>/build/<branch>/
//! ```

use buildqueue_core::Platform;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct PivotLayout {
    root: PathBuf,
}

impl PivotLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scratch directory receiving exported build scripts.
    pub fn scripts_dir(&self, platform: &Platform) -> PathBuf {
        self.root.join(platform.as_str()).join("buildscripts")
    }

    /// Directory holding one working directory per branch.
    pub fn build_dir(&self, platform: &Platform) -> PathBuf {
        self.root.join(platform.as_str()).join("build")
    }

    pub fn script_path(&self, platform: &Platform, branch: &str) -> PathBuf {
        self.scripts_dir(platform)
            .join(format!("{}-build-stage2.cmake", branch))
    }
}
