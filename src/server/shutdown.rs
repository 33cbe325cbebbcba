//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process is asked to
//! terminate. On Unix this covers `SIGINT`, `SIGTERM`, and `SIGQUIT`;
//! elsewhere it falls back to Ctrl-C.

/// Waits for a termination signal.
///
/// Each call registers its own listeners. Returns `Err` only when signal
/// registration itself fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Waits for a termination signal (Ctrl-C).
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
