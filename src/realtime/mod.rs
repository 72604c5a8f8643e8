//! Realtime update rebroadcasting.
//!
//! # Data Flow
//! ```text
//! EvaluationClient
//!     → ClientEvent over bounded mpsc (capacity 100)
//!     → rebroadcaster.rs (one task per instance; forwards RealtimeUpdate only)
//!     → broadcaster.rs (per-channel broadcast::Sender, keyed by SDK key)
//!     → GET /event-stream subscribers (SSE)
//! ```
//!
//! # Design Decisions
//! - Publish is fire-and-forget; slow subscribers lag and skip, nobody blocks
//! - The rebroadcaster stops when the client drops its sender
//! - Closing the broadcaster drops every sender so open streams finish

pub mod broadcaster;
pub mod rebroadcaster;

pub use broadcaster::{Broadcaster, DEFAULT_CHANNEL_CAPACITY};
pub use rebroadcaster::spawn_rebroadcaster;
