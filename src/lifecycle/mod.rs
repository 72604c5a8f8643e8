//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolved config → Instance::start for each instance, in order
//!
//! Instance (instance.rs):
//!     log file → [push: channel + broadcaster + rebroadcaster]
//!         → evaluation client → router → HTTP listener → Unix listener
//!
//! Shutdown (shutdown.rs):
//!     trigger → broadcaster closed → client closed → listeners drain
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → close every instance → remove socket files → exit
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal to its instance, and to the process
//! - Preconditions (port, socket path, permissions) are checked before the client starts
//! - Listener drain is bounded by LISTENER_DRAIN_TIMEOUT, then the task is aborted

pub mod instance;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use instance::{Instance, InstanceError, LISTENER_DRAIN_TIMEOUT};
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{close_all, start_all};
