//! Example configuration written by `buildqueue init`.

use crate::ConfigResult;
use std::path::Path;

pub const EXAMPLE_CONFIG: &str = r#"// buildqueue configuration
//
// Searched at /etc/buildqueue.kdl and ~/.buildqueue.kdl; keys in the second
// file override keys in the first.

general {
    // Root of the per-platform buildscripts/ and build/ directories.
    // $VAR, ${VAR} and ~ are expanded.
    pivot-directory "~/buildqueue"
    // Build script exported from each branch, relative to the branch root.
    build-script "cmake/build-stage2.cmake"
    // One of: trace, debug, info, warning, error, critical
    log-level "info"
    // Also log to this file, rotated daily, keeping the last five.
    log-file "~/buildqueue/buildqueue.log"
    poll-interval 30
    queue-capacity 48
    workers-per-platform 1
    // Local time at which each nightly window starts.
    nightly-time "01:00"
    state-file "buildqueue.nightlytimestamp"
    // Defaults to the host's build matrix when omitted.
    // platforms "linux-arm" "linux-x86"
}

subversion {
    repository "svn://svn.example.com/project"
    user "builder"
    password "change-me"
}
"#;

/// Write the example configuration to `path`, replacing any existing file.
pub fn write_example(path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, EXAMPLE_CONFIG)?;
    Ok(())
}
