//! Local bucketing proxy library.
//!
//! Exposes a feature-flag evaluation client over HTTP, on TCP and/or a Unix
//! domain socket, for server-side SDKs that cannot embed the evaluation engine.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod events;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod realtime;

pub use config::schema::{ProxyConfig, ProxyInstance};
pub use lifecycle::{Instance, InstanceError, Shutdown};
