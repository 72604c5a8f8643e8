//! Command line and environment parsing.
//!
//! Every flag has a `DEVCYCLE_PROXY_*` environment fallback. With `--config` the
//! instances come from that file; without it a single instance is assembled from
//! the remaining flags.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::loader::{finalize, load_config};
use crate::config::schema::{
    DEFAULT_HTTP_PORT, DEFAULT_UNIX_SOCKET_PATH, DEFAULT_UNIX_SOCKET_PERMISSIONS,
};
use crate::config::{ConfigError, PlatformData, ProxyConfig, ProxyInstance, SdkConfig, SdkKey};

#[derive(Debug, Parser)]
#[command(name = "bucketing-proxy", version)]
#[command(about = "Local bucketing proxy for server-side feature flag evaluation", long_about = None)]
pub struct Cli {
    /// Path to a JSON (or .toml) config file. A sample is written if it does not exist.
    #[arg(long, env = "DEVCYCLE_PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(long, env = "DEVCYCLE_PROXY_DEBUG")]
    pub debug: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "DEVCYCLE_PROXY_METRICS_ADDRESS")]
    pub metrics_address: Option<SocketAddr>,

    #[command(flatten)]
    pub instance: InstanceArgs,
}

/// Single-instance settings, used when no config file is given.
#[derive(Debug, Args)]
pub struct InstanceArgs {
    /// Server SDK key for this instance.
    #[arg(long, env = "DEVCYCLE_PROXY_SDK_KEY", hide_env_values = true)]
    pub sdk_key: Option<String>,

    #[arg(long, env = "DEVCYCLE_PROXY_UNIX_SOCKET_PATH", default_value = DEFAULT_UNIX_SOCKET_PATH)]
    pub unix_socket_path: String,

    #[arg(long, env = "DEVCYCLE_PROXY_UNIX_SOCKET_PERMISSIONS", default_value = DEFAULT_UNIX_SOCKET_PERMISSIONS)]
    pub unix_socket_permissions: String,

    #[arg(long, env = "DEVCYCLE_PROXY_UNIX_SOCKET_ENABLED", default_value_t = false,
          value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub unix_socket_enabled: bool,

    #[arg(long, env = "DEVCYCLE_PROXY_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    pub http_port: u16,

    #[arg(long, env = "DEVCYCLE_PROXY_HTTP_ENABLED", default_value_t = true,
          value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub http_enabled: bool,

    #[arg(long, env = "DEVCYCLE_PROXY_SSE_ENABLED", default_value_t = true,
          value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub sse_enabled: bool,

    /// Hostname clients use to reach the event stream.
    #[arg(long, env = "DEVCYCLE_PROXY_SSE_HOSTNAME")]
    pub sse_hostname: Option<String>,

    #[arg(long, env = "DEVCYCLE_PROXY_SSE_HTTPS", default_value_t = false,
          value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub sse_https: bool,

    #[arg(long, env = "DEVCYCLE_PROXY_TRUST_FORWARDED_HEADERS", default_value_t = false,
          value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub trust_forwarded_headers: bool,

    #[arg(long, env = "DEVCYCLE_PROXY_LOG_FILE")]
    pub log_file: Option<String>,

    #[command(flatten)]
    pub platform: PlatformArgs,

    #[command(flatten)]
    pub sdk: SdkArgs,
}

#[derive(Debug, Args)]
pub struct PlatformArgs {
    #[arg(long = "platform-sdk-version", env = "DEVCYCLE_PROXY_PLATFORMDATA_SDKVERSION")]
    pub sdk_version: Option<String>,

    #[arg(long = "platform-version", env = "DEVCYCLE_PROXY_PLATFORMDATA_PLATFORMVERSION")]
    pub platform_version: Option<String>,

    #[arg(long = "platform-device-model", env = "DEVCYCLE_PROXY_PLATFORMDATA_DEVICEMODEL")]
    pub device_model: Option<String>,

    #[arg(long = "platform", env = "DEVCYCLE_PROXY_PLATFORMDATA_PLATFORM")]
    pub platform: Option<String>,

    #[arg(long = "platform-hostname", env = "DEVCYCLE_PROXY_PLATFORMDATA_HOSTNAME")]
    pub hostname: Option<String>,
}

#[derive(Debug, Args)]
pub struct SdkArgs {
    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_EVENT_FLUSH_INTERVAL_MS", default_value_t = 0)]
    pub event_flush_interval_ms: u64,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_CONFIG_POLLING_INTERVAL_MS", default_value_t = 0)]
    pub config_polling_interval_ms: u64,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_REQUEST_TIMEOUT", default_value_t = 0)]
    pub request_timeout: u64,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_DISABLE_AUTOMATIC_EVENT_LOGGING", default_value_t = false,
          value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub disable_automatic_event_logging: bool,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_DISABLE_CUSTOM_EVENT_LOGGING", default_value_t = false,
          value_parser = BoolishValueParser::new(), action = ArgAction::Set)]
    pub disable_custom_event_logging: bool,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_MAX_EVENT_QUEUE_SIZE", default_value_t = 0)]
    pub max_event_queue_size: usize,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_FLUSH_EVENT_QUEUE_SIZE", default_value_t = 0)]
    pub flush_event_queue_size: usize,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_CONFIG_CDN_URI")]
    pub config_cdn_uri: Option<String>,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_EVENTS_API_URI")]
    pub events_api_uri: Option<String>,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_BUCKETING_API_URI")]
    pub bucketing_api_uri: Option<String>,

    #[arg(long, env = "DEVCYCLE_PROXY_SDKCONFIG_SOCKET_READY_TIMEOUT_MS", default_value_t = 0)]
    pub socket_ready_timeout_ms: u64,
}

impl InstanceArgs {
    /// Assemble an instance. Requires an SDK key.
    pub fn to_instance(&self) -> Result<ProxyInstance, ConfigError> {
        let sdk_key = self
            .sdk_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingSdkKey)?;

        Ok(ProxyInstance {
            unix_socket_path: self.unix_socket_path.clone(),
            unix_socket_permissions: self.unix_socket_permissions.clone(),
            unix_socket_enabled: self.unix_socket_enabled,
            http_port: self.http_port,
            http_enabled: self.http_enabled,
            sse_enabled: self.sse_enabled,
            sse_hostname: self.sse_hostname.clone().unwrap_or_default(),
            sse_https: self.sse_https,
            trust_forwarded_headers: self.trust_forwarded_headers,
            sdk_key: SdkKey::new(sdk_key),
            log_file: self.log_file.clone().unwrap_or_default(),
            platform_data: PlatformData {
                sdk_type: "server".to_string(),
                sdk_version: self.platform.sdk_version.clone().unwrap_or_default(),
                platform_version: self.platform.platform_version.clone().unwrap_or_default(),
                device_model: self.platform.device_model.clone().unwrap_or_default(),
                platform: self.platform.platform.clone().unwrap_or_default(),
                hostname: self.platform.hostname.clone().unwrap_or_default(),
            },
            sdk_config: SdkConfig {
                event_flush_interval_ms: self.sdk.event_flush_interval_ms,
                config_polling_interval_ms: self.sdk.config_polling_interval_ms,
                request_timeout_ms: self.sdk.request_timeout,
                disable_automatic_event_logging: self.sdk.disable_automatic_event_logging,
                disable_custom_event_logging: self.sdk.disable_custom_event_logging,
                max_event_queue_size: self.sdk.max_event_queue_size,
                flush_event_queue_size: self.sdk.flush_event_queue_size,
                config_cdn_uri: self.sdk.config_cdn_uri.clone().unwrap_or_default(),
                events_api_uri: self.sdk.events_api_uri.clone().unwrap_or_default(),
                bucketing_api_uri: self.sdk.bucketing_api_uri.clone().unwrap_or_default(),
                socket_ready_timeout_ms: self.sdk.socket_ready_timeout_ms,
            },
        })
    }
}

impl Cli {
    /// Resolve the full proxy configuration from the file or the instance flags.
    pub fn load_config(&self) -> Result<ProxyConfig, ConfigError> {
        match &self.config {
            Some(path) => load_config(path),
            None => {
                tracing::info!("No config path provided, reading configuration from flags and environment");
                finalize(ProxyConfig {
                    instances: vec![self.instance.to_instance()?],
                })
            }
        }
    }
}
