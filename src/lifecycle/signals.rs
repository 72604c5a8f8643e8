//! OS signal handling.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGINT and SIGTERM both mean "close every instance and exit"

use tokio::signal::unix::{signal, SignalKind};

/// Wait for SIGINT or SIGTERM. Returns the name of the signal received.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut terminate = signal(SignalKind::terminate())?;
    let name = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            "SIGINT"
        }
        _ = terminate.recv() => "SIGTERM",
    };
    tracing::info!(signal = name, "Shutdown signal received");
    Ok(name)
}
