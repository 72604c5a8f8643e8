//! One running proxy instance.
//!
//! # Responsibilities
//! - Start the instance's collaborators in dependency order
//! - Own the evaluation client, broadcaster and listener tasks for its lifetime
//! - Tear everything down on close
//!
//! # Design Decisions
//! - No partial instance is ever returned: a failure after the client exists closes it
//! - The socket file is left for the caller to remove after close

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::{ClientError, ClientFactory, ClientOptions, EvaluationClient, EVENT_CHANNEL_CAPACITY};
use crate::config::{parse_permissions, ProxyInstance};
use crate::http::server::{build_router, serve_tcp, serve_unix, AppState};
use crate::lifecycle::Shutdown;
use crate::net::{self, ListenerError, SOCKET_POLL_INTERVAL};
use crate::observability::logging;
use crate::realtime::{spawn_rebroadcaster, Broadcaster};

/// Upper bound on waiting for a listener to drain during close.
pub const LISTENER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("HTTP port must be set")]
    MissingHttpPort,

    #[error("invalid unix socket permissions {0:?}")]
    InvalidPermissions(String),

    #[error("error creating evaluation client: {0}")]
    Client(#[from] ClientError),

    #[error("error creating HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("socket {} did not appear within {timeout:?}", .path.display())]
    SocketNotReady { path: PathBuf, timeout: Duration },
}

pub struct Instance {
    config: Arc<ProxyInstance>,
    client: Arc<dyn EvaluationClient>,
    broadcaster: Option<Arc<Broadcaster>>,
    rebroadcaster: Option<JoinHandle<()>>,
    shutdown: Shutdown,
    listeners: Vec<JoinHandle<()>>,
    http_addr: Option<SocketAddr>,
}

impl Instance {
    /// Start an instance from its resolved configuration.
    pub async fn start(
        mut config: ProxyInstance,
        factory: &dyn ClientFactory,
    ) -> Result<Self, InstanceError> {
        config.apply_defaults();

        if let Some(path) = config.log_file_path() {
            logging::attach_log_file(&path).map_err(|source| InstanceError::LogFile {
                path: path.clone(),
                source,
            })?;
        }

        let socket_mode = check_preconditions(&config)?;

        let mut broadcaster = None;
        let mut rebroadcaster = None;
        let mut event_sink = None;
        if config.sse_enabled {
            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let shared = Arc::new(Broadcaster::default());
            rebroadcaster = Some(spawn_rebroadcaster(
                rx,
                shared.clone(),
                config.sdk_key.expose().to_string(),
            ));
            broadcaster = Some(shared);
            event_sink = Some(tx);
            tracing::info!(hostname = %config.sse_hostname, "Initialized realtime event stream");
        }

        let options = ClientOptions::for_instance(&config, event_sink);
        let client = match factory.build(&config.sdk_key, options).await {
            Ok(client) => client,
            Err(e) => {
                if let Some(task) = rebroadcaster {
                    task.abort();
                }
                return Err(InstanceError::Client(e));
            }
        };

        let mut instance = Instance {
            config: Arc::new(config),
            client,
            broadcaster,
            rebroadcaster,
            shutdown: Shutdown::new(),
            listeners: Vec::new(),
            http_addr: None,
        };

        if let Err(e) = instance.start_listeners(socket_mode).await {
            tracing::error!(error = %e, "Instance failed to start");
            instance.close().await;
            return Err(e);
        }
        Ok(instance)
    }

    async fn start_listeners(&mut self, socket_mode: Option<u32>) -> Result<(), InstanceError> {
        let state = AppState::new(
            self.config.as_ref().clone(),
            self.client.clone(),
            self.broadcaster.clone(),
        )?;
        let router = build_router(state);

        if self.config.http_enabled {
            let listener = net::bind_tcp(self.config.http_port).await?;
            self.http_addr = Some(listener.local_addr().map_err(|source| {
                ListenerError::BindTcp {
                    port: self.config.http_port,
                    source,
                }
            })?);
            let shutdown = self.shutdown.subscribe();
            let router = router.clone();
            self.listeners.push(tokio::spawn(async move {
                if let Err(e) = serve_tcp(listener, router, shutdown).await {
                    tracing::error!(error = %e, "Error running HTTP server");
                }
            }));
            tracing::info!(port = self.config.http_port, "HTTP server started");
        }

        if let Some(mode) = socket_mode {
            let path = self.config.socket_path();
            let listener = net::bind_unix(&path)?;
            let shutdown = self.shutdown.subscribe();
            self.listeners.push(tokio::spawn(async move {
                if let Err(e) = serve_unix(listener, router, shutdown).await {
                    tracing::error!(error = %e, "Error running Unix socket server");
                }
            }));

            let timeout = self.config.sdk_config.socket_ready_timeout();
            if !net::wait_for_socket(&path, SOCKET_POLL_INTERVAL, timeout).await {
                return Err(InstanceError::SocketNotReady { path, timeout });
            }
            if let Err(e) = net::apply_permissions(&path, mode) {
                tracing::error!(error = %e, "Failed to set Unix socket permissions");
            }
            tracing::info!(path = %path.display(), mode = %format!("{mode:o}"), "Unix socket server started");
        }

        Ok(())
    }

    pub fn config(&self) -> &ProxyInstance {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn EvaluationClient> {
        &self.client
    }

    /// Bound TCP address when HTTP is enabled.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    /// Socket file the caller should remove after [`Instance::close`].
    pub fn socket_path(&self) -> Option<PathBuf> {
        self.config
            .unix_socket_enabled
            .then(|| self.config.socket_path())
    }

    /// Stop listeners, end subscriber streams and close the evaluation client.
    pub async fn close(mut self) {
        self.shutdown.trigger();
        if let Some(broadcaster) = &self.broadcaster {
            broadcaster.close();
        }
        if let Err(e) = self.client.close().await {
            tracing::warn!(error = %e, "Failed to close evaluation client");
        }

        for mut handle in self.listeners.drain(..) {
            if tokio::time::timeout(LISTENER_DRAIN_TIMEOUT, &mut handle)
                .await
                .is_err()
            {
                tracing::warn!("Listener did not drain in time, aborting");
                handle.abort();
            }
        }
        if let Some(mut task) = self.rebroadcaster.take() {
            if tokio::time::timeout(LISTENER_DRAIN_TIMEOUT, &mut task)
                .await
                .is_err()
            {
                task.abort();
            }
        }
        tracing::info!("Instance closed");
    }
}

/// Check what can be checked before anything starts. Returns the parsed socket
/// mode when the Unix socket is enabled.
fn check_preconditions(config: &ProxyInstance) -> Result<Option<u32>, InstanceError> {
    if config.http_enabled && config.http_port == 0 {
        return Err(InstanceError::MissingHttpPort);
    }
    if !config.unix_socket_enabled {
        return Ok(None);
    }

    let path = config.socket_path();
    if net::listener::path_occupied(&path) {
        return Err(ListenerError::SocketExists(path).into());
    }
    parse_permissions(&config.unix_socket_permissions)
        .map(Some)
        .ok_or_else(|| InstanceError::InvalidPermissions(config.unix_socket_permissions.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unix_instance(path: PathBuf) -> ProxyInstance {
        ProxyInstance {
            unix_socket_enabled: true,
            unix_socket_path: path.display().to_string(),
            unix_socket_permissions: "0755".to_string(),
            ..ProxyInstance::default()
        }
    }

    #[test]
    fn http_without_port_is_rejected() {
        let config = ProxyInstance {
            http_enabled: true,
            http_port: 0,
            ..ProxyInstance::default()
        };
        assert!(matches!(
            check_preconditions(&config),
            Err(InstanceError::MissingHttpPort)
        ));
    }

    #[test]
    fn occupied_socket_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("busy.sock");
        std::fs::write(&path, b"").unwrap();

        let err = check_preconditions(&unix_instance(path)).unwrap_err();
        assert!(matches!(
            err,
            InstanceError::Listener(ListenerError::SocketExists(_))
        ));
    }

    #[test]
    fn permissions_are_parsed_up_front() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = unix_instance(dir.path().join("proxy.sock"));
        assert_eq!(check_preconditions(&config).unwrap(), Some(0o755));

        config.unix_socket_permissions = "rwxr-xr-x".to_string();
        assert!(matches!(
            check_preconditions(&config),
            Err(InstanceError::InvalidPermissions(_))
        ));
    }

    #[test]
    fn nothing_to_check_without_unix_socket() {
        assert_eq!(check_preconditions(&ProxyInstance::default()).unwrap(), None);
    }
}
