//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Instance start
//!     → listener.rs: bind_tcp (0.0.0.0:{httpPort})
//!     → listener.rs: bind_unix ({unixSocketPath}, must not exist yet)
//!         → wait_for_socket (100 ms poll, bounded)
//!         → apply_permissions (octal mode; failure is logged only)
//!     → Hand off to http::server
//!
//! Instance close
//!     → remove_socket
//! ```

pub mod listener;

pub use listener::{
    apply_permissions, bind_tcp, bind_unix, remove_socket, wait_for_socket, ListenerError,
    SOCKET_POLL_INTERVAL,
};
