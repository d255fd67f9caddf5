//! OS signal handling.

/// Wait for Ctrl-C.
///
/// If the handler cannot be installed this never returns, so the process
/// keeps running rather than shutting down on a spurious error.
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}
