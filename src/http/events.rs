//! Event submission handlers.
//!
//! `/v1/track` and `/v1/events` hand each event to the evaluation client.
//! `/v1/events/batch` stamps provenance and relays the batch to the events API.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::client::UserEventsBody;
use crate::events::{rewrite_batch, PROXY_VERSION};
use crate::http::request::parse_json;
use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Header carrying the caller's platform, copied into `metaData.sdkPlatform`.
pub const X_SDK_PLATFORM: &str = "x-sdk-platform";

/// `POST /v1/track`, `POST /v1/events`
pub async fn track(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let submission: UserEventsBody = parse_json(&body)?;
    let total = submission.events.len();

    let mut failed = 0;
    for event in submission.events {
        if let Err(e) = state.client.track(&submission.user, event).await {
            tracing::error!(error = %e, "Failed to track event");
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(ApiError::Internal(format!(
            "Failed to track {failed} of {total} events."
        )));
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": format!("Successfully received {total} events.") })),
    )
        .into_response())
}

/// `POST /v1/events/batch`
pub async fn batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut document: Value = parse_json(&body)?;
    let platform = headers
        .get(X_SDK_PLATFORM)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    let stamped = rewrite_batch(&mut document, PROXY_VERSION, platform);
    tracing::debug!(events = stamped, "Forwarding event batch");

    let payload = serde_json::to_vec(&document)
        .map_err(|e| ApiError::Internal(format!("Failed to encode event batch: {e}")))?;

    let forwarded = state
        .events
        .forward(headers.get(AUTHORIZATION), payload)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to forward event batch");
            ApiError::Internal("Error sending request".to_string())
        })?;

    let mut response = (forwarded.status, forwarded.body).into_response();
    match forwarded.content_type {
        Some(content_type) => {
            response.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        None => {
            response.headers_mut().remove(CONTENT_TYPE);
        }
    }
    Ok(response)
}
