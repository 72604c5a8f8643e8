//! Listener binding for the two transports.
//!
//! # Responsibilities
//! - Bind the TCP listener on all interfaces
//! - Bind the Unix domain socket, refusing to replace an existing file
//! - Poll for the socket file and apply its permission bits

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, UnixListener};
use tokio::time::Instant;

/// Interval between checks for the socket file.
pub const SOCKET_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind TCP port {port}: {source}")]
    BindTcp { port: u16, source: io::Error },

    #[error("socket path {} already exists", .0.display())]
    SocketExists(PathBuf),

    #[error("failed to bind Unix socket {}: {source}", .path.display())]
    BindUnix { path: PathBuf, source: io::Error },

    #[error("failed to set permissions {mode:o} on {}: {source}", .path.display())]
    Permissions {
        path: PathBuf,
        mode: u32,
        source: io::Error,
    },
}

/// Bind `0.0.0.0:{port}`.
pub async fn bind_tcp(port: u16) -> Result<TcpListener, ListenerError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ListenerError::BindTcp { port, source })?;
    tracing::info!(address = %addr, "TCP listener bound");
    Ok(listener)
}

/// Whether anything (file, socket, dangling symlink) exists at `path`.
pub fn path_occupied(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Bind a Unix domain socket at `path`. Fails if the path is already taken.
pub fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    if path_occupied(path) {
        return Err(ListenerError::SocketExists(path.to_path_buf()));
    }
    let listener = UnixListener::bind(path).map_err(|source| ListenerError::BindUnix {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Unix listener bound");
    Ok(listener)
}

/// Poll every `interval` until the socket file exists. Returns false after `timeout`.
pub async fn wait_for_socket(path: &Path, interval: Duration, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if path_occupied(path) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Set the permission bits of the socket file.
pub fn apply_permissions(path: &Path, mode: u32) -> Result<(), ListenerError> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).map_err(|source| {
        ListenerError::Permissions {
            path: path.to_path_buf(),
            mode,
            source,
        }
    })
}

/// Remove a socket file left behind by a closed instance. Missing files are fine.
pub fn remove_socket(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
