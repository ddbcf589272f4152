//! Version-control backends for the buildqueue dispatcher.
//!
//! Provides `VersionControlClient` implementations:
//! - Subversion, through the `svn` command-line client

pub mod subversion;

pub use buildqueue_core::vcs::{BranchInfo, CommitInfo, VersionControlClient};
pub use subversion::SubversionClient;
