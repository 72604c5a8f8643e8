//! Config cache gateway.
//!
//! # Data Flow
//! ```text
//! GET /config/v1/server/{key}.json   (bypass mode)
//!     → bypass.rs: conditional GET to the config CDN
//!         200 → replace cached bytes + validators
//!         304 → keep bytes, refresh validators
//!         other / error → keep bytes, empty validators
//!
//! GET /config/v2/server/{key}.json   (delegated mode)
//!     → EvaluationClient::raw_config (client owns freshness)
//!     → realtime.rs: point the `sse` descriptor at this proxy (push mode only)
//!
//! Both → ETag + Last-Modified response headers
//! ```
//!
//! # Design Decisions
//! - The gateway serves validators; it never answers `304` itself
//! - The bypass cache is owned by one instance and refreshed under a lock

pub mod bypass;
pub mod realtime;

pub use bypass::{BypassCache, CachedConfig, FetchOutcome};
pub use realtime::{external_base, rewrite_document, EVENT_STREAM_PATH};

/// Suffix every requested config key must carry.
pub const CONFIG_KEY_SUFFIX: &str = ".json";

/// Whether a requested config key path segment is acceptable.
pub fn is_valid_config_key(key: &str) -> bool {
    key.len() > CONFIG_KEY_SUFFIX.len() && key.ends_with(CONFIG_KEY_SUFFIX)
}
