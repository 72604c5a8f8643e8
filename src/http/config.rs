//! Configuration document handlers.
//!
//! Both routes serve validators through `ETag` / `Last-Modified` and never
//! answer conditional requests themselves.

use axum::{
    extract::{Path, State},
    http::{
        header::{CONTENT_TYPE, ETAG, LAST_MODIFIED},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};

use crate::client::RawConfig;
use crate::gateway::{is_valid_config_key, rewrite_document};
use crate::http::request::PeerAddr;
use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Protocol version fetched from the CDN by the bypass route.
pub const BYPASS_VERSION: &str = "v1";

fn require_config_key(key: &str) -> Result<(), ApiError> {
    if is_valid_config_key(key) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Invalid config key, expected a '.json' suffix".to_string(),
        ))
    }
}

/// `GET /config/v1/server/{sdk_key}`
pub async fn bypass_config(
    State(state): State<AppState>,
    Path(sdk_key): Path<String>,
) -> Result<Response, ApiError> {
    require_config_key(&sdk_key)?;
    let config = state.bypass.fetch(BYPASS_VERSION).await;
    Ok(config_response(config))
}

/// `GET /config/v2/server/{sdk_key}`
pub async fn delegated_config(
    State(state): State<AppState>,
    Path(sdk_key): Path<String>,
    peer: PeerAddr,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    require_config_key(&sdk_key)?;

    let mut config = state.client.raw_config().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to read config from evaluation client");
        ApiError::Internal("Failed to load config".to_string())
    })?;

    if state.instance.sse_enabled {
        config.body = rewrite_document(config.body, &state.instance, &headers, peer)?;
    }
    Ok(config_response(config))
}

fn config_response(config: RawConfig) -> Response {
    let mut response = (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        config.body,
    )
        .into_response();

    set_validator(&mut response, ETAG, &config.etag);
    set_validator(&mut response, LAST_MODIFIED, &config.last_modified);
    response
}

fn set_validator(response: &mut Response, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            response.headers_mut().insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Dropping unrepresentable validator"),
    }
}
