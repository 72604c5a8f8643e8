//! Authentication middleware for the evaluation API.
//! Only server SDK keys are allowed through.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::key::{is_server_key, normalize};
use crate::http::response::ApiError;

/// Query parameter accepted as an alternative to the `Authorization` header.
pub const SDK_KEY_PARAM: &str = "sdkKey";

/// Normalized key of an authenticated request, available to downstream handlers.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedKey(pub String);

impl std::fmt::Debug for AuthenticatedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthenticatedKey([REDACTED])")
    }
}

/// Raw credential from the request; the header wins over the query parameter.
fn raw_credential(request: &Request<Body>) -> Option<String> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    if let Some(value) = header {
        return Some(value.to_string());
    }

    let query = request.uri().query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == SDK_KEY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|v| !v.is_empty())
}

pub async fn require_server_key(mut request: Request<Body>, next: Next) -> Response {
    let Some(raw) = raw_credential(&request) else {
        return ApiError::Unauthorized(
            "Missing 'sdkKey' query parameter or 'Authorization' header".to_string(),
        )
        .into_response();
    };

    let key = normalize(&raw);
    if !is_server_key(&key) {
        tracing::debug!(path = %request.uri().path(), "Rejected non-server SDK key");
        return ApiError::Unauthorized(format!(
            "Only 'server', 'dvc_server' keys are supported by this API. Invalid key: {}",
            raw
        ))
        .into_response();
    }

    request.extensions_mut().insert(AuthenticatedKey(key));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode, middleware, routing::get, Extension, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(calls: Arc<AtomicUsize>) -> Router {
        Router::new()
            .route(
                "/protected",
                get(move |Extension(key): Extension<AuthenticatedKey>| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        key.0
                    }
                }),
            )
            .layer(middleware::from_fn(require_server_key))
    }

    async fn call(app: Router, uri: &str, auth: Option<&str>) -> (StatusCode, String) {
        let mut builder = Request::builder().uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(AUTHORIZATION, auth);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn missing_credential_is_rejected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, body) = call(app(calls.clone()), "/protected", None).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["statusCode"], 401);
        assert_eq!(
            json["message"],
            "Missing 'sdkKey' query parameter or 'Authorization' header"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_server_keys_never_reach_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        for key in ["dvc_client_abc", "dvc_mobile_abc", "client-abc", "garbage", "dvc"] {
            let (status, body) = call(app(calls.clone()), "/protected", Some(key)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "key {key}");
            assert!(body.contains(&format!("Invalid key: {key}")));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn server_key_from_query_is_accepted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, body) = call(app(calls.clone()), "/protected?sdkKey=dvc_server_q", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "dvc_server_q");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn header_wins_over_query() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, body) = call(
            app(calls.clone()),
            "/protected?sdkKey=dvc_server_query",
            Some("Bearer dvc_server_header"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "dvc_server_header");

        let (status, _) = call(
            app(calls.clone()),
            "/protected?sdkKey=dvc_server_query",
            Some("dvc_client_header"),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
