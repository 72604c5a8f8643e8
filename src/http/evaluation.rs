//! Variable and feature evaluation handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};

use crate::client::{ClientError, User};
use crate::http::request::parse_json;
use crate::http::response::ApiError;
use crate::http::server::AppState;

fn evaluation_failed(operation: &'static str) -> impl FnOnce(ClientError) -> ApiError {
    move |e| {
        tracing::error!(operation, error = %e, "Evaluation client call failed");
        ApiError::Internal(format!("Failed to evaluate {operation}"))
    }
}

/// `POST /v1/variables/{key}`
pub async fn variable(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if key != key.to_lowercase() {
        return Err(ApiError::bad_request("Variable Key must be lowercase"));
    }
    let user: User = parse_json(&body)?;

    let variable = state
        .client
        .variable(&user, &key)
        .await
        .map_err(evaluation_failed("variable"))?;

    if variable.defaulted {
        return Err(ApiError::NotFound(format!(
            "Variable not found for key: {key}"
        )));
    }
    Ok(Json(variable).into_response())
}

/// `POST /v1/variables`
pub async fn all_variables(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let user: User = parse_json(&body)?;
    let variables = state
        .client
        .all_variables(&user)
        .await
        .map_err(evaluation_failed("variables"))?;
    Ok(Json(variables).into_response())
}

/// `POST /v1/features`
pub async fn all_features(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let user: User = parse_json(&body)?;
    let features = state
        .client
        .all_features(&user)
        .await
        .map_err(evaluation_failed("features"))?;
    Ok(Json(features).into_response())
}
