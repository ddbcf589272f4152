//! Build execution backends for the buildqueue dispatcher.
//!
//! Provides executor implementations for running exported build scripts:
//! - CTest (`ctest --script`)

pub mod ctest;

pub use buildqueue_core::executor::{BuildExecutor, BuildOutcome, BuildRequest};
pub use ctest::CtestExecutor;
