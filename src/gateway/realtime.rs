//! Realtime endpoint rewriting for delegated config documents.
//!
//! A configuration document may carry an `sse` descriptor telling SDKs where to
//! subscribe for realtime updates. When the proxy rebroadcasts those updates it
//! points the descriptor at itself.

use axum::http::HeaderMap;
use bytes::Bytes;
use serde_json::Value;

use crate::config::ProxyInstance;
use crate::http::request::PeerAddr;
use crate::http::response::ApiError;

/// Path of the push-event endpoint served by every instance.
pub const EVENT_STREAM_PATH: &str = "/event-stream";

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Base address under which clients can reach this instance's event stream.
pub fn external_base(
    instance: &ProxyInstance,
    headers: &HeaderMap,
    peer: PeerAddr,
) -> Result<String, ApiError> {
    if instance.trust_forwarded_headers {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
        };
        let host = header(X_FORWARDED_HOST)
            .ok_or_else(|| ApiError::Forbidden("Missing X-Forwarded-Host header".to_string()))?;
        let scheme = header(X_FORWARDED_PROTO).unwrap_or("http");
        return Ok(format!("{scheme}://{host}"));
    }

    if peer.is_local_socket() {
        return Ok(format!("unix://{}", instance.unix_socket_path));
    }

    let scheme = if instance.sse_https { "https" } else { "http" };
    Ok(format!(
        "{scheme}://{}:{}",
        instance.sse_hostname, instance.http_port
    ))
}

/// Whether the document carries an `sse` descriptor object.
pub fn has_descriptor(document: &Value) -> bool {
    document.get("sse").is_some_and(Value::is_object)
}

/// Point the document's `sse` descriptor at `base`. Returns false when there is none.
pub fn rewrite_descriptor(document: &mut Value, base: &str) -> bool {
    let Some(sse) = document.get_mut("sse").and_then(Value::as_object_mut) else {
        return false;
    };
    sse.insert("hostname".to_string(), Value::String(base.to_string()));
    sse.insert(
        "path".to_string(),
        Value::String(EVENT_STREAM_PATH.to_string()),
    );
    true
}

/// Rewrite the raw document for this request, leaving it untouched when it has
/// no descriptor or is not valid JSON.
pub fn rewrite_document(
    body: Bytes,
    instance: &ProxyInstance,
    headers: &HeaderMap,
    peer: PeerAddr,
) -> Result<Bytes, ApiError> {
    let mut document: Value = match serde_json::from_slice(&body) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!(error = %e, "Config document is not valid JSON, serving unmodified");
            return Ok(body);
        }
    };

    if !has_descriptor(&document) {
        return Ok(body);
    }

    let base = external_base(instance, headers, peer)?;
    rewrite_descriptor(&mut document, &base);
    let rewritten = serde_json::to_vec(&document)
        .map_err(|e| ApiError::Internal(format!("Failed to encode config: {e}")))?;
    Ok(Bytes::from(rewritten))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;
    use std::net::SocketAddr;

    fn instance() -> ProxyInstance {
        ProxyInstance {
            http_port: 8080,
            sse_enabled: true,
            sse_hostname: "proxy.internal".to_string(),
            unix_socket_path: "/tmp/devcycle.sock".to_string(),
            ..ProxyInstance::default()
        }
    }

    fn tcp_peer() -> PeerAddr {
        PeerAddr(Some("127.0.0.1:40000".parse::<SocketAddr>().unwrap()))
    }

    #[test]
    fn uses_configured_hostname_and_port() {
        let base = external_base(&instance(), &HeaderMap::new(), tcp_peer()).unwrap();
        assert_eq!(base, "http://proxy.internal:8080");

        let mut https = instance();
        https.sse_https = true;
        let base = external_base(&https, &HeaderMap::new(), tcp_peer()).unwrap();
        assert_eq!(base, "https://proxy.internal:8080");
    }

    #[test]
    fn local_socket_requests_get_unix_address() {
        let base = external_base(&instance(), &HeaderMap::new(), PeerAddr(None)).unwrap();
        assert_eq!(base, "unix:///tmp/devcycle.sock");
    }

    #[test]
    fn forwarded_headers_take_precedence() {
        let mut trusted = instance();
        trusted.trust_forwarded_headers = true;

        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("flags.example.com"));
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        let base = external_base(&trusted, &headers, PeerAddr(None)).unwrap();
        assert_eq!(base, "https://flags.example.com");

        headers.remove(X_FORWARDED_PROTO);
        let base = external_base(&trusted, &headers, tcp_peer()).unwrap();
        assert_eq!(base, "http://flags.example.com");
    }

    #[test]
    fn missing_forwarded_host_is_forbidden() {
        let mut trusted = instance();
        trusted.trust_forwarded_headers = true;
        let err = external_base(&trusted, &HeaderMap::new(), tcp_peer()).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn rewrites_only_the_sse_descriptor() {
        let body = Bytes::from(
            json!({
                "project": {"key": "p"},
                "sse": {"hostname": "https://sse.upstream.com", "path": "/v1/sse"}
            })
            .to_string(),
        );
        let rewritten = rewrite_document(body, &instance(), &HeaderMap::new(), tcp_peer()).unwrap();
        let document: Value = serde_json::from_slice(&rewritten).unwrap();
        assert_eq!(document["sse"]["hostname"], "http://proxy.internal:8080");
        assert_eq!(document["sse"]["path"], EVENT_STREAM_PATH);
        assert_eq!(document["project"]["key"], "p");
    }

    #[test]
    fn documents_without_descriptor_pass_through_untouched() {
        let mut trusted = instance();
        trusted.trust_forwarded_headers = true;
        let body = Bytes::from_static(b"{ \"project\": {} }");
        let served = rewrite_document(body.clone(), &trusted, &HeaderMap::new(), tcp_peer()).unwrap();
        assert_eq!(served, body);
    }
}
