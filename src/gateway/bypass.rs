//! Bypass-mode config cache.
//!
//! Fetches the configuration document straight from the config CDN with a
//! conditional GET and keeps the last good copy. Staleness beats unavailability:
//! a failed refresh serves the cached bytes instead of an error.

use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use reqwest::StatusCode;
use tokio::sync::Mutex;

use crate::client::RawConfig;
use crate::config::SdkKey;
use crate::observability::metrics;

/// Result of one refresh attempt against the CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// `200`: a new document and its validators.
    Fresh(RawConfig),
    /// `304`: the cached document is current; validators from the response.
    NotModified { etag: String, last_modified: String },
    /// Any other status, or a transport failure.
    Unavailable,
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Fresh(_) => "fresh",
            FetchOutcome::NotModified { .. } => "not_modified",
            FetchOutcome::Unavailable => "unavailable",
        }
    }
}

/// The cached document and the validators currently served with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedConfig {
    body: Bytes,
    etag: String,
    last_modified: String,
}

impl CachedConfig {
    /// Fold a refresh outcome into the cache and return what should be served.
    pub fn apply(&mut self, outcome: FetchOutcome) -> RawConfig {
        match outcome {
            FetchOutcome::Fresh(fresh) => {
                self.body = fresh.body;
                self.etag = fresh.etag;
                self.last_modified = fresh.last_modified;
            }
            FetchOutcome::NotModified { etag, last_modified } => {
                self.etag = etag;
                self.last_modified = last_modified;
            }
            FetchOutcome::Unavailable => {
                self.etag.clear();
                self.last_modified.clear();
            }
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> RawConfig {
        RawConfig {
            body: self.body.clone(),
            etag: self.etag.clone(),
            last_modified: self.last_modified.clone(),
        }
    }

    fn has_document(&self) -> bool {
        !self.body.is_empty()
    }
}

/// Per-instance bypass cache. Refreshes are serialized so every caller observes
/// the result of the refresh that completed before it.
pub struct BypassCache {
    cdn_uri: String,
    sdk_key: SdkKey,
    http: reqwest::Client,
    state: Mutex<CachedConfig>,
}

impl BypassCache {
    pub fn new(cdn_uri: impl Into<String>, sdk_key: SdkKey, http: reqwest::Client) -> Self {
        Self {
            cdn_uri: cdn_uri.into(),
            sdk_key,
            http,
            state: Mutex::new(CachedConfig::default()),
        }
    }

    pub fn document_url(&self, version: &str) -> String {
        format!(
            "{}/config/{}/server/{}.json",
            self.cdn_uri.trim_end_matches('/'),
            version,
            self.sdk_key.expose()
        )
    }

    /// Refresh from the CDN and return the document to serve.
    pub async fn fetch(&self, version: &str) -> RawConfig {
        let mut cached = self.state.lock().await;
        let outcome = self.request(version, &cached).await;
        tracing::debug!(version, outcome = outcome.label(), "Bypass config refresh");
        metrics::record_bypass_fetch(outcome.label());
        cached.apply(outcome)
    }

    async fn request(&self, version: &str, cached: &CachedConfig) -> FetchOutcome {
        let mut request = self.http.get(self.document_url(version));
        if cached.has_document() {
            if !cached.etag.is_empty() {
                request = request.header(IF_NONE_MATCH, &cached.etag);
            }
            if !cached.last_modified.is_empty() {
                request = request.header(IF_MODIFIED_SINCE, &cached.last_modified);
            }
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let e = e.without_url();
                tracing::warn!(error = %e, "Bypass config fetch failed, serving cached copy");
                return FetchOutcome::Unavailable;
            }
        };

        let etag = header_string(response.headers(), ETAG);
        let last_modified = header_string(response.headers(), LAST_MODIFIED);

        match response.status() {
            StatusCode::OK => match response.bytes().await {
                Ok(body) => FetchOutcome::Fresh(RawConfig {
                    body,
                    etag,
                    last_modified,
                }),
                Err(e) => {
                    let e = e.without_url();
                    tracing::warn!(error = %e, "Failed reading bypass config body");
                    FetchOutcome::Unavailable
                }
            },
            StatusCode::NOT_MODIFIED => FetchOutcome::NotModified {
                etag,
                last_modified,
            },
            status => {
                tracing::warn!(status = %status, "Unexpected bypass config status, serving cached copy");
                FetchOutcome::Unavailable
            }
        }
    }
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(body: &'static str, etag: &str, last_modified: &str) -> FetchOutcome {
        FetchOutcome::Fresh(RawConfig {
            body: Bytes::from_static(body.as_bytes()),
            etag: etag.to_string(),
            last_modified: last_modified.to_string(),
        })
    }

    fn seeded() -> CachedConfig {
        let mut cache = CachedConfig::default();
        cache.apply(fresh("{\"v\":1}", "\"e1\"", "Mon, 01 Jan 2024 00:00:00 GMT"));
        cache
    }

    #[test]
    fn fresh_replaces_bytes_and_validators() {
        let mut cache = seeded();
        let served = cache.apply(fresh("{\"v\":2}", "\"e2\"", "Tue, 02 Jan 2024 00:00:00 GMT"));
        assert_eq!(served.body, Bytes::from_static(b"{\"v\":2}"));
        assert_eq!(served.etag, "\"e2\"");
        assert_eq!(served.last_modified, "Tue, 02 Jan 2024 00:00:00 GMT");
        assert_eq!(cache.snapshot(), served);
    }

    #[test]
    fn not_modified_keeps_bytes_and_replaces_validators() {
        let mut cache = seeded();
        let served = cache.apply(FetchOutcome::NotModified {
            etag: "\"e3\"".to_string(),
            last_modified: "Wed, 03 Jan 2024 00:00:00 GMT".to_string(),
        });
        assert_eq!(served.body, Bytes::from_static(b"{\"v\":1}"));
        assert_eq!(served.etag, "\"e3\"");
        assert_eq!(served.last_modified, "Wed, 03 Jan 2024 00:00:00 GMT");
    }

    #[test]
    fn unavailable_keeps_bytes_and_clears_validators() {
        let mut cache = seeded();
        let served = cache.apply(FetchOutcome::Unavailable);
        assert_eq!(served.body, Bytes::from_static(b"{\"v\":1}"));
        assert!(served.etag.is_empty());
        assert!(served.last_modified.is_empty());
    }

    #[test]
    fn unavailable_before_first_fetch_serves_empty_document() {
        let mut cache = CachedConfig::default();
        let served = cache.apply(FetchOutcome::Unavailable);
        assert!(served.body.is_empty());
    }

    #[test]
    fn document_url_uses_version_and_instance_key() {
        let cache = BypassCache::new(
            "https://config-cdn.example.com/",
            SdkKey::new("dvc_server_abc"),
            reqwest::Client::new(),
        );
        assert_eq!(
            cache.document_url("v1"),
            "https://config-cdn.example.com/config/v1/server/dvc_server_abc.json"
        );
    }

    #[tokio::test]
    async fn transport_failure_serves_cached_copy() {
        let cache = BypassCache::new(
            "http://127.0.0.1:1",
            SdkKey::new("dvc_server_abc"),
            reqwest::Client::new(),
        );
        *cache.state.lock().await = seeded();

        let served = cache.fetch("v1").await;
        assert_eq!(served.body, Bytes::from_static(b"{\"v\":1}"));
        assert!(served.etag.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_sdk_key_out_of_logs() {
        use crate::observability::logging::{open_log_file, FileSinks};

        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("bypass.log");
        let sinks = FileSinks::default();
        sinks.attach(open_log_file(&log_path).unwrap());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(sinks)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);

        let cache = BypassCache::new(
            "http://127.0.0.1:1",
            SdkKey::new("dvc_server_topsecret"),
            reqwest::Client::new(),
        );
        cache.fetch("v1").await;
        drop(guard);

        let logs = std::fs::read_to_string(&log_path).unwrap();
        assert!(logs.contains("Bypass config fetch failed"));
        assert!(!logs.contains("topsecret"), "logs: {logs}");
    }
}
