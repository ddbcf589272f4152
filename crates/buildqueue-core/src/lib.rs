//! Core domain types and collaborator traits for the buildqueue dispatcher.
//!
//! This crate contains:
//! - Build descriptors, build kinds and platform identifiers
//! - The version-control client trait and its branch/commit types
//! - The build executor trait and its request/outcome types

pub mod build;
pub mod error;
pub mod executor;
pub mod vcs;

pub use build::{BuildDescriptor, BuildKind, Platform, TRUNK};
pub use error::{ExecutorError, VcsError};
pub use executor::{BuildExecutor, BuildOutcome, BuildRequest};
pub use vcs::{BranchInfo, CommitInfo, VersionControlClient};
