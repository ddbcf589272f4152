//! The dispatcher daemon.

use crate::shutdown::install_shutdown_handler;
use anyhow::{Context, Result};
use buildqueue_config::{Settings, load_settings};
use buildqueue_executor::CtestExecutor;
use buildqueue_scheduler::Dispatcher;
use buildqueue_vcs::SubversionClient;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub async fn run(config: Option<&Path>) -> Result<()> {
    let (settings, files) = load_settings(config).context("Failed to load configuration")?;
    let _log_guard = init_tracing(&settings)?;

    for file in &files {
        info!(path = %file.display(), "Loaded configuration");
    }
    info!(
        pivot = %settings.general.pivot_directory.display(),
        repository = %settings.subversion.repository,
        platforms = ?settings.general.platforms,
        "Starting buildqueue"
    );

    let shutdown = install_shutdown_handler()?;

    let subversion = &settings.subversion;
    let vcs = SubversionClient::new(
        &subversion.repository,
        subversion.user.clone(),
        subversion.password.clone(),
    );
    let executor = Arc::new(CtestExecutor::new());

    let dispatcher = Dispatcher::new(&settings, Box::new(vcs), executor);
    dispatcher.run(shutdown).await;

    info!("buildqueue stopped");
    Ok(())
}

/// Log files kept after rotation.
const LOG_FILES_KEPT: usize = 5;

/// Console logging plus an optional rotated log file. `RUST_LOG` wins over
/// the configured log level.
///
/// The returned guard flushes the file writer and must outlive the daemon.
fn init_tracing(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.general.log_level.as_filter()));

    let (file_layer, guard) = match &settings.general.log_file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(file_appender(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Daily-rotated appender writing `<dir>/<name>.<date>`.
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .with_context(|| format!("Log file has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name.to_string_lossy())
        .max_log_files(LOG_FILES_KEPT)
        .build(dir)
        .with_context(|| format!("Failed to open log file: {}", path.display()))
}
