//! Dispatcher settings parsing.

use crate::expand::expand_path;
use crate::{ConfigError, ConfigResult};
use buildqueue_core::Platform;
use chrono::NaiveTime;
use kdl::{KdlDocument, KdlNode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_QUEUE_CAPACITY: usize = 48;
const DEFAULT_WORKERS_PER_PLATFORM: usize = 1;
const DEFAULT_NIGHTLY_TIME: &str = "01:00";
const DEFAULT_STATE_FILE: &str = "buildqueue.nightlytimestamp";

/// Complete dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub general: GeneralSettings,
    pub subversion: SubversionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Root of the per-platform `buildscripts` and `build` directories.
    pub pivot_directory: PathBuf,
    /// Build script path relative to a branch root.
    pub build_script: String,
    pub log_level: LogLevel,
    /// Rotated log file written in addition to the console, if set.
    pub log_file: Option<PathBuf>,
    /// Period of the discovery loop.
    pub poll_interval: Duration,
    /// Maximum pending builds per platform queue.
    pub queue_capacity: usize,
    pub workers_per_platform: usize,
    /// Local time of day at which each nightly window starts.
    pub nightly_time: NaiveTime,
    /// Where the last nightly fire time is persisted.
    pub state_file: PathBuf,
    pub platforms: Vec<Platform>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SubversionSettings {
    pub repository: Url,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for SubversionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubversionSettings")
            .field("repository", &self.repository.as_str())
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl SubversionSettings {
    /// Repository location without its scheme, as handed to build scripts.
    pub fn location(&self) -> String {
        let url = self.repository.as_str();
        url.split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(url)
            .trim_end_matches('/')
            .to_string()
    }
}

/// Log verbosity accepted in `log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" | "critical" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {}", s)),
        }
    }
}

/// Settings collected from one or more files before validation.
///
/// Later files override earlier ones key by key.
#[derive(Debug, Clone, Default)]
struct RawSettings {
    pivot_directory: Option<String>,
    build_script: Option<String>,
    log_level: Option<String>,
    log_file: Option<String>,
    poll_interval: Option<i128>,
    queue_capacity: Option<i128>,
    workers_per_platform: Option<i128>,
    nightly_time: Option<String>,
    state_file: Option<String>,
    platforms: Option<Vec<String>>,
    repository: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

impl RawSettings {
    fn from_kdl(kdl: &str) -> ConfigResult<Self> {
        let doc: KdlDocument = kdl.parse()?;
        let mut raw = RawSettings::default();

        for node in doc.nodes() {
            match node.name().value() {
                "general" => raw.read_general(node),
                "subversion" => raw.read_subversion(node),
                _ => {} // Ignore unknown sections
            }
        }

        Ok(raw)
    }

    fn read_general(&mut self, section: &KdlNode) {
        let Some(children) = section.children() else {
            return;
        };
        for child in children.nodes() {
            match child.name().value() {
                "pivot-directory" => self.pivot_directory = get_first_string_arg(child),
                "build-script" => self.build_script = get_first_string_arg(child),
                "log-level" => self.log_level = get_first_string_arg(child),
                "log-file" => self.log_file = get_first_string_arg(child),
                "poll-interval" => self.poll_interval = get_first_integer_arg(child),
                "queue-capacity" => self.queue_capacity = get_first_integer_arg(child),
                "workers-per-platform" => {
                    self.workers_per_platform = get_first_integer_arg(child)
                }
                "nightly-time" => self.nightly_time = get_first_string_arg(child),
                "state-file" => self.state_file = get_first_string_arg(child),
                "platforms" => self.platforms = Some(get_all_string_args(child)),
                _ => {}
            }
        }
    }

    fn read_subversion(&mut self, section: &KdlNode) {
        let Some(children) = section.children() else {
            return;
        };
        for child in children.nodes() {
            match child.name().value() {
                "repository" => self.repository = get_first_string_arg(child),
                "user" => self.user = get_first_string_arg(child),
                "password" => self.password = get_first_string_arg(child),
                _ => {}
            }
        }
    }

    fn merge(self, later: RawSettings) -> RawSettings {
        RawSettings {
            pivot_directory: later.pivot_directory.or(self.pivot_directory),
            build_script: later.build_script.or(self.build_script),
            log_level: later.log_level.or(self.log_level),
            log_file: later.log_file.or(self.log_file),
            poll_interval: later.poll_interval.or(self.poll_interval),
            queue_capacity: later.queue_capacity.or(self.queue_capacity),
            workers_per_platform: later.workers_per_platform.or(self.workers_per_platform),
            nightly_time: later.nightly_time.or(self.nightly_time),
            state_file: later.state_file.or(self.state_file),
            platforms: later.platforms.or(self.platforms),
            repository: later.repository.or(self.repository),
            user: later.user.or(self.user),
            password: later.password.or(self.password),
        }
    }

    fn validate(self) -> ConfigResult<Settings> {
        let pivot_directory = require(self.pivot_directory, "general.pivot-directory")?;
        let build_script = require(self.build_script, "general.build-script")?;
        let log_level = require(self.log_level, "general.log-level")?;
        let repository = require(self.repository, "subversion.repository")?;
        let user = require(self.user, "subversion.user")?;
        let password = require(self.password, "subversion.password")?;

        let log_level = log_level
            .parse::<LogLevel>()
            .map_err(|message| invalid("general.log-level", message))?;

        let repository = Url::parse(&repository)
            .map_err(|e| invalid("subversion.repository", e.to_string()))?;

        let build_script = build_script.trim_start_matches('/').to_string();
        if build_script.is_empty() {
            return Err(invalid("general.build-script", "must not be empty"));
        }

        let poll_interval = positive(
            self.poll_interval,
            DEFAULT_POLL_INTERVAL_SECS as i128,
            "general.poll-interval",
        )?;
        let queue_capacity = positive(
            self.queue_capacity,
            DEFAULT_QUEUE_CAPACITY as i128,
            "general.queue-capacity",
        )?;
        let workers_per_platform = positive(
            self.workers_per_platform,
            DEFAULT_WORKERS_PER_PLATFORM as i128,
            "general.workers-per-platform",
        )?;

        let nightly_time = self
            .nightly_time
            .as_deref()
            .unwrap_or(DEFAULT_NIGHTLY_TIME);
        let nightly_time = NaiveTime::parse_from_str(nightly_time, "%H:%M")
            .map_err(|e| invalid("general.nightly-time", format!("{} (expected HH:MM)", e)))?;

        let platforms = match self.platforms {
            Some(names) if !names.is_empty() => names.into_iter().map(Platform::new).collect(),
            Some(_) => return Err(invalid("general.platforms", "must list at least one platform")),
            None => Platform::host_defaults(),
        };
        if platforms.is_empty() {
            return Err(invalid(
                "general.platforms",
                "unknown host platform, list the platforms to build explicitly",
            ));
        }

        Ok(Settings {
            general: GeneralSettings {
                pivot_directory: expand_path(&pivot_directory),
                build_script,
                log_level,
                log_file: self
                    .log_file
                    .filter(|f| !f.trim().is_empty())
                    .map(|f| expand_path(&f)),
                poll_interval: Duration::from_secs(poll_interval as u64),
                queue_capacity: queue_capacity as usize,
                workers_per_platform: workers_per_platform as usize,
                nightly_time,
                state_file: expand_path(self.state_file.as_deref().unwrap_or(DEFAULT_STATE_FILE)),
                platforms,
            },
            subversion: SubversionSettings {
                repository,
                user,
                password,
            },
        })
    }
}

/// Parse and validate settings from a single KDL document.
pub fn parse_settings(kdl: &str) -> ConfigResult<Settings> {
    RawSettings::from_kdl(kdl)?.validate()
}

/// Files consulted when no explicit configuration path is given, in override order.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/buildqueue.kdl")];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(Path::new(&home).join(".buildqueue.kdl"));
    }
    paths
}

/// Load settings from `explicit`, or merge every existing file of the search path.
///
/// Returns the settings together with the files that were read.
pub fn load_settings(explicit: Option<&Path>) -> ConfigResult<(Settings, Vec<PathBuf>)> {
    let candidates = match explicit {
        Some(path) => vec![path.to_path_buf()],
        None => default_search_paths(),
    };

    let mut raw = RawSettings::default();
    let mut read = Vec::new();
    for path in &candidates {
        if explicit.is_none() && !path.exists() {
            continue;
        }
        let content = std::fs::read_to_string(path)?;
        raw = raw.merge(RawSettings::from_kdl(&content)?);
        read.push(path.clone());
    }

    if read.is_empty() {
        return Err(ConfigError::NotFound(candidates));
    }

    Ok((raw.validate()?, read))
}

fn require(value: Option<String>, field: &str) -> ConfigResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

fn positive(value: Option<i128>, default: i128, field: &str) -> ConfigResult<i128> {
    let value = value.unwrap_or(default);
    if value < 1 || value > u32::MAX as i128 {
        return Err(invalid(field, format!("must be a positive integer, got {}", value)));
    }
    Ok(value)
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_first_integer_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        general {
            pivot-directory "/srv/buildqueue"
            build-script "cmake/build-stage2.cmake"
            log-level "info"
            platforms "linux-arm" "linux-x86"
        }
        subversion {
            repository "svn://svn.example.com/project"
            user "builder"
            password "hunter2"
        }
    "#;

    #[test]
    fn test_parse_minimal_settings_with_defaults() {
        let settings = parse_settings(MINIMAL).unwrap();
        assert_eq!(settings.general.pivot_directory, PathBuf::from("/srv/buildqueue"));
        assert_eq!(settings.general.build_script, "cmake/build-stage2.cmake");
        assert_eq!(settings.general.log_level, LogLevel::Info);
        assert_eq!(settings.general.log_file, None);
        assert_eq!(settings.general.poll_interval, Duration::from_secs(30));
        assert_eq!(settings.general.queue_capacity, 48);
        assert_eq!(settings.general.workers_per_platform, 1);
        assert_eq!(
            settings.general.nightly_time,
            NaiveTime::from_hms_opt(1, 0, 0).unwrap()
        );
        assert_eq!(
            settings.general.platforms,
            vec![Platform::new("linux-arm"), Platform::new("linux-x86")]
        );
        assert_eq!(settings.subversion.user, "builder");
    }

    #[test]
    fn test_parse_overrides() {
        let kdl = r#"
            general {
                pivot-directory "/srv/pivot"
                build-script "/build.cmake"
                log-level "warning"
                log-file "/var/log/buildqueue/buildqueue.log"
                poll-interval 5
                queue-capacity 4
                workers-per-platform 2
                nightly-time "03:30"
                platforms "windows-x86"
            }
            subversion {
                repository "svn://svn.example.com/project/"
                user "u"
                password "p"
            }
        "#;

        let settings = parse_settings(kdl).unwrap();
        assert_eq!(settings.general.build_script, "build.cmake");
        assert_eq!(settings.general.log_level, LogLevel::Warn);
        assert_eq!(
            settings.general.log_file,
            Some(PathBuf::from("/var/log/buildqueue/buildqueue.log"))
        );
        assert_eq!(settings.general.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.general.queue_capacity, 4);
        assert_eq!(settings.general.workers_per_platform, 2);
        assert_eq!(
            settings.general.nightly_time,
            NaiveTime::from_hms_opt(3, 30, 0).unwrap()
        );
        assert_eq!(settings.subversion.location(), "svn.example.com/project");
    }

    #[test]
    fn test_missing_required_field() {
        let kdl = r#"
            general {
                pivot-directory "/srv/pivot"
                log-level "info"
            }
            subversion {
                repository "svn://svn.example.com/project"
                user "u"
                password "p"
            }
        "#;

        let result = parse_settings(kdl);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::MissingField(field) if field == "general.build-script"
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let kdl = MINIMAL.replace("\"info\"", "\"loud\"");
        let result = parse_settings(&kdl);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "general.log-level"
        ));
    }

    #[test]
    fn test_invalid_repository_url() {
        let kdl = MINIMAL.replace("svn://svn.example.com/project", "not a url");
        assert!(matches!(
            parse_settings(&kdl).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "subversion.repository"
        ));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let kdl = MINIMAL.replace(
            "log-level \"info\"",
            "log-level \"info\"\n queue-capacity 0",
        );
        assert!(matches!(
            parse_settings(&kdl).unwrap_err(),
            ConfigError::InvalidValue { field, .. } if field == "general.queue-capacity"
        ));
    }

    #[test]
    fn test_password_not_in_debug_output() {
        let settings = parse_settings(MINIMAL).unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("buildqueue.kdl");
        std::fs::write(&path, MINIMAL).unwrap();

        let (settings, read) = load_settings(Some(&path)).unwrap();
        assert_eq!(read, vec![path]);
        assert_eq!(settings.subversion.password, "hunter2");
    }

    #[test]
    fn test_later_file_overrides_per_key() {
        let base = RawSettings::from_kdl(MINIMAL).unwrap();
        let user = RawSettings::from_kdl(
            r#"
            general {
                log-level "debug"
            }
            "#,
        )
        .unwrap();

        let settings = base.merge(user).validate().unwrap();
        assert_eq!(settings.general.log_level, LogLevel::Debug);
        assert_eq!(settings.general.build_script, "cmake/build-stage2.cmake");
    }

    #[test]
    fn test_missing_explicit_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_settings(Some(&dir.path().join("absent.kdl")));
        assert!(matches!(result.unwrap_err(), ConfigError::Io(_)));
    }
}
