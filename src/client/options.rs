//! Evaluation client options derived from an instance's configuration.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::client::types::ClientEvent;
use crate::config::{PlatformData, ProxyInstance};

/// Capacity of the notification channel between the client and the rebroadcaster.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Everything an [`EvaluationClient`](crate::client::EvaluationClient) needs to run.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub event_flush_interval: Duration,
    pub config_polling_interval: Duration,
    pub request_timeout: Duration,
    pub disable_automatic_event_logging: bool,
    pub disable_custom_event_logging: bool,
    pub max_event_queue_size: usize,
    pub flush_event_queue_size: usize,
    pub config_cdn_uri: String,
    pub events_api_uri: String,
    pub bucketing_api_uri: String,
    pub disable_realtime_updates: bool,
    pub platform_data: PlatformData,
    /// Where the client publishes [`ClientEvent`]s. The client must not block on it.
    pub event_sink: Option<mpsc::Sender<ClientEvent>>,
}

impl ClientOptions {
    /// Build options for `instance`, wiring `event_sink` as the client's notification channel.
    pub fn for_instance(
        instance: &ProxyInstance,
        event_sink: Option<mpsc::Sender<ClientEvent>>,
    ) -> Self {
        let mut sdk = instance.sdk_config.clone();
        sdk.apply_defaults();

        let mut platform_data = instance.platform_data.clone();
        platform_data.sdk_type = "server".to_string();

        Self {
            event_flush_interval: sdk.event_flush_interval(),
            config_polling_interval: sdk.config_polling_interval(),
            request_timeout: sdk.request_timeout(),
            disable_automatic_event_logging: sdk.disable_automatic_event_logging,
            disable_custom_event_logging: sdk.disable_custom_event_logging,
            max_event_queue_size: sdk.max_event_queue_size,
            flush_event_queue_size: sdk.flush_event_queue_size,
            config_cdn_uri: sdk.config_cdn_uri,
            events_api_uri: sdk.events_api_uri,
            bucketing_api_uri: sdk.bucketing_api_uri,
            disable_realtime_updates: !instance.sse_enabled,
            platform_data,
            event_sink,
        }
    }
}
