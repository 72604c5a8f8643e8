//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//! Missing fields deserialize to their zero value; [`ProxyConfig::apply_defaults`]
//! then fills in the system defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_UNIX_SOCKET_PATH: &str = "/tmp/devcycle.sock";
pub const DEFAULT_UNIX_SOCKET_PERMISSIONS: &str = "0755";
pub const DEFAULT_CONFIG_CDN_URI: &str = "https://config-cdn.devcycle.com";
pub const DEFAULT_EVENTS_API_URI: &str = "https://events.devcycle.com";
pub const DEFAULT_BUCKETING_API_URI: &str = "https://bucketing-api.devcycle.com";

/// Root configuration: every proxy instance this process runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub instances: Vec<ProxyInstance>,
}

impl ProxyConfig {
    /// Fill zero-valued fields of every instance with system defaults.
    pub fn apply_defaults(&mut self) {
        for instance in &mut self.instances {
            instance.apply_defaults();
        }
    }

    /// A ready-to-edit single instance config, written when the config file is missing.
    pub fn sample() -> Self {
        let mut config = Self {
            instances: vec![ProxyInstance {
                unix_socket_path: DEFAULT_UNIX_SOCKET_PATH.to_string(),
                unix_socket_permissions: DEFAULT_UNIX_SOCKET_PERMISSIONS.to_string(),
                http_port: DEFAULT_HTTP_PORT,
                http_enabled: true,
                platform_data: PlatformData {
                    sdk_type: "server".to_string(),
                    sdk_version: env!("CARGO_PKG_VERSION").to_string(),
                    platform_version: String::new(),
                    device_model: String::new(),
                    platform: "Rust".to_string(),
                    hostname: local_hostname().unwrap_or_else(|| "unknown".to_string()),
                },
                ..ProxyInstance::default()
            }],
        };
        config.apply_defaults();
        config
    }
}

/// One addressable endpoint set with its own evaluation client.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyInstance {
    /// Path of the Unix domain socket.
    #[serde(rename = "unixSocketPath")]
    pub unix_socket_path: String,

    /// Octal file mode applied to the socket once it exists (e.g. "0755").
    #[serde(rename = "unixSocketPermissions")]
    pub unix_socket_permissions: String,

    #[serde(rename = "unixSocketEnabled")]
    pub unix_socket_enabled: bool,

    #[serde(rename = "httpPort")]
    pub http_port: u16,

    #[serde(rename = "httpEnabled")]
    pub http_enabled: bool,

    /// Rebroadcast realtime config updates over `/event-stream`.
    #[serde(rename = "sseEnabled")]
    pub sse_enabled: bool,

    /// Hostname advertised to clients for the event stream. Must be reachable by them.
    #[serde(rename = "sseHostname")]
    pub sse_hostname: String,

    /// Advertise the event stream with an `https` scheme.
    #[serde(rename = "sseHttps")]
    pub sse_https: bool,

    /// Derive the advertised event stream address from `X-Forwarded-*` headers only.
    #[serde(rename = "trustForwardedHeaders")]
    pub trust_forwarded_headers: bool,

    /// Server SDK key for this instance.
    #[serde(rename = "sdkKey")]
    pub sdk_key: SdkKey,

    /// Optional log file; log lines are written here in addition to stdout.
    #[serde(rename = "logFile")]
    pub log_file: String,

    #[serde(rename = "platformData")]
    pub platform_data: PlatformData,

    #[serde(rename = "sdkConfig")]
    pub sdk_config: SdkConfig,
}

impl ProxyInstance {
    pub fn apply_defaults(&mut self) {
        self.sdk_config.apply_defaults();
        if self.http_enabled && self.http_port == 0 {
            self.http_port = DEFAULT_HTTP_PORT;
        }
        if self.unix_socket_enabled {
            if self.unix_socket_path.is_empty() {
                self.unix_socket_path = DEFAULT_UNIX_SOCKET_PATH.to_string();
            }
            if self.unix_socket_permissions.is_empty() {
                self.unix_socket_permissions = DEFAULT_UNIX_SOCKET_PERMISSIONS.to_string();
            }
        }
        if self.sse_enabled && self.sse_hostname.is_empty() {
            self.sse_hostname = local_hostname().unwrap_or_else(|| "localhost".to_string());
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        PathBuf::from(&self.unix_socket_path)
    }

    pub fn log_file_path(&self) -> Option<PathBuf> {
        if self.log_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.log_file))
        }
    }
}

/// Platform metadata reported by the evaluation client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformData {
    #[serde(rename = "sdkType")]
    pub sdk_type: String,
    #[serde(rename = "sdkVersion")]
    pub sdk_version: String,
    #[serde(rename = "platformVersion")]
    pub platform_version: String,
    #[serde(rename = "deviceModel")]
    pub device_model: String,
    pub platform: String,
    pub hostname: String,
}

/// Evaluation client tuning knobs. Zero means "use the system default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SdkConfig {
    #[serde(rename = "eventFlushIntervalMS")]
    pub event_flush_interval_ms: u64,

    #[serde(rename = "configPollingIntervalMS")]
    pub config_polling_interval_ms: u64,

    /// Timeout for requests to the config CDN and events API, in milliseconds.
    #[serde(rename = "requestTimeout")]
    pub request_timeout_ms: u64,

    #[serde(rename = "disableAutomaticEventLogging")]
    pub disable_automatic_event_logging: bool,

    #[serde(rename = "disableCustomEventLogging")]
    pub disable_custom_event_logging: bool,

    /// Events held in the queue before new ones are dropped.
    #[serde(rename = "maxEventsPerFlush")]
    pub max_event_queue_size: usize,

    /// Events held in the queue before a flush is forced.
    #[serde(rename = "minEventsPerFlush")]
    pub flush_event_queue_size: usize,

    #[serde(rename = "configCDNURI")]
    pub config_cdn_uri: String,

    #[serde(rename = "eventsAPIURI")]
    pub events_api_uri: String,

    #[serde(rename = "bucketingAPIURI")]
    pub bucketing_api_uri: String,

    /// How long instance startup waits for the Unix socket file to appear.
    #[serde(rename = "socketReadyTimeoutMS")]
    pub socket_ready_timeout_ms: u64,
}

impl SdkConfig {
    pub fn apply_defaults(&mut self) {
        if self.event_flush_interval_ms == 0 {
            self.event_flush_interval_ms = 3_000;
        }
        if self.config_polling_interval_ms == 0 {
            self.config_polling_interval_ms = 30_000;
        }
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = 30_000;
        }
        if self.max_event_queue_size == 0 {
            self.max_event_queue_size = 10_000;
        }
        if self.flush_event_queue_size == 0 {
            self.flush_event_queue_size = 100;
        }
        if self.config_cdn_uri.is_empty() {
            self.config_cdn_uri = DEFAULT_CONFIG_CDN_URI.to_string();
        }
        if self.events_api_uri.is_empty() {
            self.events_api_uri = DEFAULT_EVENTS_API_URI.to_string();
        }
        if self.bucketing_api_uri.is_empty() {
            self.bucketing_api_uri = DEFAULT_BUCKETING_API_URI.to_string();
        }
        if self.socket_ready_timeout_ms == 0 {
            self.socket_ready_timeout_ms = 10_000;
        }
    }

    pub fn event_flush_interval(&self) -> Duration {
        Duration::from_millis(self.event_flush_interval_ms)
    }

    pub fn config_polling_interval(&self) -> Duration {
        Duration::from_millis(self.config_polling_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn socket_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_ready_timeout_ms)
    }
}

/// SDK key. Never printed; use [`SdkKey::expose`] where the raw value is required.
#[derive(Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SdkKey(String);

impl SdkKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SdkKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Debug for SdkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SdkKey([REDACTED])")
    }
}

impl fmt::Display for SdkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string())
        .filter(|h| !h.is_empty())
}
