//! KDL configuration parsing for the buildqueue dispatcher.
//!
//! This crate handles:
//! - Parsing and validating the dispatcher settings
//! - Locating and merging configuration files
//! - Environment variable expansion in paths
//! - The example configuration written by `buildqueue init`

pub mod error;
pub mod example;
pub mod expand;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use example::{EXAMPLE_CONFIG, write_example};
pub use settings::{
    GeneralSettings, LogLevel, Settings, SubversionSettings, default_search_paths, load_settings,
    parse_settings,
};
