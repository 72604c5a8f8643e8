//! Request handling helpers.
//!
//! # Responsibilities
//! - Generate and propagate a unique request ID (UUID v4)
//! - Expose the peer address, or its absence, to handlers
//! - Decode JSON bodies into the error envelope on failure
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - A request without a peer address arrived over the Unix socket listener

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::SocketAddr;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer,
};

use crate::http::response::ApiError;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layer that assigns an `x-request-id` to requests missing one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that copies the request's `x-request-id` onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Address of the connected peer. `None` for Unix socket connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub Option<SocketAddr>);

impl PeerAddr {
    pub fn is_local_socket(&self) -> bool {
        self.0.is_none()
    }
}

impl<S> FromRequestParts<S> for PeerAddr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PeerAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}

/// Decode a JSON request body, mapping failures to the 400 envelope.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest {
            message: "Missing JSON body".to_string(),
            exception: None,
        });
    }
    serde_json::from_slice(body).map_err(ApiError::invalid_body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn peer_addr_reads_connect_info() {
        let addr: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        let mut request = Request::builder().body(()).unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        let (mut parts, _) = request.into_parts();

        let peer = PeerAddr::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(peer, PeerAddr(Some(addr)));
        assert!(!peer.is_local_socket());
    }

    #[tokio::test]
    async fn missing_connect_info_means_local_socket() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let peer = PeerAddr::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(peer.is_local_socket());
    }

    #[test]
    fn parse_json_distinguishes_missing_and_invalid() {
        let missing = parse_json::<serde_json::Value>(b"").unwrap_err();
        assert!(matches!(missing, ApiError::BadRequest { ref message, .. } if message == "Missing JSON body"));

        let invalid = parse_json::<serde_json::Value>(b"{nope").unwrap_err();
        assert!(matches!(invalid, ApiError::BadRequest { exception: Some(_), .. }));
    }
}
