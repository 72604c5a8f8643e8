//! Upstream events API forwarder.

use axum::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use crate::observability::metrics;

/// Path of the batch endpoint on the events API.
pub const BATCH_PATH: &str = "/v1/events/batch";

/// What the events API answered, relayed to the caller as-is.
#[derive(Debug)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

pub struct EventsForwarder {
    url: String,
    http: reqwest::Client,
}

impl EventsForwarder {
    pub fn new(events_api_uri: &str, http: reqwest::Client) -> Self {
        Self {
            url: format!("{}{}", events_api_uri.trim_end_matches('/'), BATCH_PATH),
            http,
        }
    }

    /// POST `body` upstream, copying the caller's `Authorization` header verbatim.
    pub async fn forward(
        &self,
        authorization: Option<&HeaderValue>,
        body: Vec<u8>,
    ) -> Result<ForwardedResponse, reqwest::Error> {
        let mut request = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(authorization) = authorization {
            request = request.header(AUTHORIZATION, authorization.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let body = response.bytes().await?;

        tracing::debug!(status = %status, "Forwarded event batch");
        metrics::record_events_forwarded(status.as_u16());

        Ok(ForwardedResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_url_joins_events_uri() {
        let forwarder = EventsForwarder::new("https://events.example.com/", reqwest::Client::new());
        assert_eq!(forwarder.url, "https://events.example.com/v1/events/batch");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_an_error() {
        let forwarder = EventsForwarder::new("http://127.0.0.1:1", reqwest::Client::new());
        assert!(forwarder.forward(None, b"{}".to_vec()).await.is_err());
    }
}
