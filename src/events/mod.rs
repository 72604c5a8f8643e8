//! Event batch passthrough.
//!
//! # Data Flow
//! ```text
//! POST /v1/events/batch  (authenticated)
//!     → batch.rs: stamp metaData.sdkProxy / sdkPlatform on every event
//!     → upstream.rs: POST to {eventsAPIURI}/v1/events/batch with the
//!       caller's Authorization header
//!     → relay upstream status + body verbatim
//! ```
//!
//! # Design Decisions
//! - Malformed batch elements are skipped, never rejected
//! - The proxy never retries; the caller sees the upstream's answer

pub mod batch;
pub mod upstream;

pub use batch::{rewrite_batch, PROXY_VERSION};
pub use upstream::{EventsForwarder, ForwardedResponse};
