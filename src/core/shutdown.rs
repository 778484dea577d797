//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process is asked to stop
//! and reports which signal did it, so the daemon can log it before draining.
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`. Elsewhere: Ctrl-C only.

/// Waits for a termination signal and returns its name.
///
/// Fails only if a signal listener cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    Ok(name)
}

/// Waits for Ctrl-C and returns its name.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
