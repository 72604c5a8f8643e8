//! Startup orchestration.
//!
//! # Responsibilities
//! - Start every configured instance in order
//! - Roll back already-started instances when a later one fails
//! - Close instances and clean up their socket files on exit
//!
//! # Design Decisions
//! - Fail fast: one broken instance stops the whole process
//! - Instances start sequentially, never concurrently

use crate::client::ClientFactory;
use crate::config::ProxyConfig;
use crate::lifecycle::{Instance, InstanceError};
use crate::net;

/// Start every instance of `config`. On failure, instances started so far are closed.
pub async fn start_all(
    config: ProxyConfig,
    factory: &dyn ClientFactory,
) -> Result<Vec<Instance>, InstanceError> {
    let mut started = Vec::with_capacity(config.instances.len());
    for (index, instance) in config.instances.into_iter().enumerate() {
        tracing::info!(
            index,
            http_enabled = instance.http_enabled,
            http_port = instance.http_port,
            unix_socket_enabled = instance.unix_socket_enabled,
            unix_socket_path = %instance.unix_socket_path,
            sse_enabled = instance.sse_enabled,
            "Creating bucketing proxy instance"
        );
        match Instance::start(instance, factory).await {
            Ok(instance) => started.push(instance),
            Err(e) => {
                tracing::error!(index, error = %e, "Failed to start instance");
                close_all(started).await;
                return Err(e);
            }
        }
    }
    Ok(started)
}

/// Close every instance, then remove the socket files they owned.
pub async fn close_all(instances: Vec<Instance>) {
    for instance in instances {
        let socket = instance.socket_path();
        instance.close().await;
        if let Some(path) = socket {
            if let Err(e) = net::remove_socket(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove socket file");
            }
        }
    }
}
