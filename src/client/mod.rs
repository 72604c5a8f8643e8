//! Evaluation client boundary.
//!
//! # Data Flow
//! ```text
//! ProxyInstance
//!     → options.rs (ClientOptions, event sink wiring)
//!     → ClientFactory::build
//!     → Arc<dyn EvaluationClient> shared by every handler of the instance
//!
//! Client background work (config polling, event flushing)
//!     → ClientEvent on the bounded event sink
//!     → realtime::Rebroadcaster
//! ```
//!
//! # Design Decisions
//! - Flag evaluation lives entirely behind the trait; the proxy never buckets
//! - The client owns config freshness; the proxy only reads its latest document
//! - `cloud.rs` is the bundled implementation used by the binary

pub mod cloud;
pub mod options;
pub mod types;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SdkKey;

pub use cloud::{CloudClient, CloudClientFactory};
pub use options::{ClientOptions, EVENT_CHANNEL_CAPACITY};
pub use types::{
    ClientEvent, Event, Feature, PushEvent, RawConfig, User, UserEventsBody, Variable,
};

/// Errors reported by an evaluation client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(reqwest::Error),

    #[error("upstream responded with status {0}")]
    Status(u16),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no configuration loaded yet")]
    NotReady,

    #[error("event queue is full ({0} events)")]
    QueueFull(usize),

    #[error("custom event logging is disabled")]
    EventsDisabled,

    #[error("client is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ClientError {
    /// Drops the request URL; CDN URLs carry the SDK key.
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e.without_url())
    }
}

/// A feature-flag evaluation engine the proxy exposes over HTTP.
#[async_trait]
pub trait EvaluationClient: Send + Sync {
    /// Resolve one variable; an unresolved key comes back with `defaulted` set.
    async fn variable(&self, user: &User, key: &str) -> Result<Variable, ClientError>;

    async fn all_variables(&self, user: &User) -> Result<BTreeMap<String, Variable>, ClientError>;

    async fn all_features(&self, user: &User) -> Result<BTreeMap<String, Feature>, ClientError>;

    /// Queue one custom event for `user`.
    async fn track(&self, user: &User, event: Event) -> Result<(), ClientError>;

    /// The latest raw configuration document and its validators.
    async fn raw_config(&self) -> Result<RawConfig, ClientError>;

    /// Stop background work and release the event sink.
    async fn close(&self) -> Result<(), ClientError>;
}

/// Builds the evaluation client for an instance.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn build(
        &self,
        sdk_key: &SdkKey,
        options: ClientOptions,
    ) -> Result<Arc<dyn EvaluationClient>, ClientError>;
}
