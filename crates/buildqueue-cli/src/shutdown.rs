use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Install a handler that cancels the returned token on SIGTERM or SIGINT.
#[cfg(unix)]
pub fn install_shutdown_handler() -> Result<CancellationToken> {
    use anyhow::Context;
    use tokio::signal::unix::{SignalKind, signal};

    let token = CancellationToken::new();
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, finishing running builds");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, finishing running builds");
            }
        }

        cancel.cancel();
    });

    Ok(token)
}

/// Install a handler that cancels the returned token on Ctrl-C.
#[cfg(not(unix))]
pub fn install_shutdown_handler() -> Result<CancellationToken> {
    let token = CancellationToken::new();

    let cancel = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received Ctrl-C, finishing running builds");
                cancel.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });

    Ok(token)
}
