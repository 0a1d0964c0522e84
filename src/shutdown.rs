use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use crate::error::{ManagerError, Result};

/// Install a handler that turns SIGTERM or SIGINT into an orderly shutdown.
///
/// Returns a `CancellationToken` that is cancelled when either signal
/// arrives; the control loop treats that like an `exit` command. Must be
/// called from within a Tokio runtime.
pub fn install_shutdown_handler() -> Result<CancellationToken> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| ManagerError::Startup(format!("failed to install SIGTERM handler: {}", e)))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| ManagerError::Startup(format!("failed to install SIGINT handler: {}", e)))?;

    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, shutting down");
            }
        }

        token_clone.cancel();
    });

    Ok(token)
}
