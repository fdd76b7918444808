use tokio::signal;

/// Resolves once the process is asked to stop, at which point axum stops
/// accepting connections and drains what is in flight.
pub(crate) async fn shutdown_signal() {
    wait_for_signal().await;
    tracing::info!("Shutdown signal received, draining in-flight requests");
}

#[cfg(unix)]
async fn wait_for_signal() {
    let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "Could not install SIGTERM handler");
            return wait_for_interrupt().await;
        }
    };

    tokio::select! {
        _ = wait_for_interrupt() => {},
        _ = sigterm.recv() => {},
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_interrupt().await;
}

async fn wait_for_interrupt() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Could not install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
