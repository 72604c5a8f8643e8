//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP or Unix connection
//!     → server.rs (Axum router, middleware stack)
//!     → request.rs (request ID, peer address, JSON bodies)
//!     → auth (server-key guard, /v1 only)
//!     → evaluation.rs | events.rs | config.rs | stream.rs
//!     → response.rs (error envelope)
//! ```

pub mod config;
pub mod evaluation;
pub mod events;
pub mod request;
pub mod response;
pub mod server;
pub mod stream;

pub use request::{PeerAddr, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{build_router, AppState, MAX_BODY_BYTES};
