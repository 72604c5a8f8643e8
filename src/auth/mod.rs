//! Authentication for the evaluation API.
//!
//! # Data Flow
//! ```text
//! Authorization header | ?sdkKey=
//!     → middleware.rs (header wins, strip "Bearer ")
//!     → key.rs (classify key type)
//!     → "server": AuthenticatedKey in request extensions → handler
//!     → anything else: 401 envelope, handler never runs
//! ```

pub mod key;
pub mod middleware;

pub use middleware::{require_server_key, AuthenticatedKey};
