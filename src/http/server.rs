//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router for one instance
//! - Wire up middleware (request ID, tracing, panic recovery, body limit, metrics)
//! - Guard the `/v1` group with the server-key check
//! - Serve the router on a TCP or Unix listener until shutdown
//!
//! # Design Decisions
//! - One router per instance; every collaborator arrives through `AppState`
//! - Auth is a `route_layer` so unmatched paths still 404 instead of 401

use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::auth::require_server_key;
use crate::client::EvaluationClient;
use crate::config::ProxyInstance;
use crate::events::EventsForwarder;
use crate::gateway::{BypassCache, EVENT_STREAM_PATH};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::http::{config, evaluation, events, stream};
use crate::observability::metrics;
use crate::realtime::Broadcaster;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub instance: Arc<ProxyInstance>,
    pub client: Arc<dyn EvaluationClient>,
    pub bypass: Arc<BypassCache>,
    pub events: Arc<EventsForwarder>,
    pub broadcaster: Option<Arc<Broadcaster>>,
}

impl AppState {
    pub fn new(
        instance: ProxyInstance,
        client: Arc<dyn EvaluationClient>,
        broadcaster: Option<Arc<Broadcaster>>,
    ) -> Result<Self, reqwest::Error> {
        let mut sdk = instance.sdk_config.clone();
        sdk.apply_defaults();

        let http = reqwest::Client::builder()
            .timeout(sdk.request_timeout())
            .build()?;

        Ok(Self {
            bypass: Arc::new(BypassCache::new(
                sdk.config_cdn_uri.clone(),
                instance.sdk_key.clone(),
                http.clone(),
            )),
            events: Arc::new(EventsForwarder::new(&sdk.events_api_uri, http)),
            instance: Arc::new(instance),
            client,
            broadcaster,
        })
    }
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::Internal("Internal Server Error".to_string()).into_response()
}

/// Build the routing table for one instance.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/variables", post(evaluation::all_variables))
        .route("/variables/{key}", post(evaluation::variable))
        .route("/features", post(evaluation::all_features))
        .route("/track", post(events::track))
        .route("/events", post(events::track))
        .route("/events/batch", post(events::batch))
        .route_layer(middleware::from_fn(require_server_key));

    Router::new()
        .route("/healthz", get(health))
        .nest("/v1", protected)
        .route("/config/v1/server/{sdk_key}", get(config::bypass_config))
        .route("/config/v2/server/{sdk_key}", get(config::delegated_config))
        .route(EVENT_STREAM_PATH, get(stream::event_stream))
        .with_state(state)
        .layer(middleware::from_fn(metrics::track_requests))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(MatchedPath::as_str)
                .unwrap_or("unmatched");
            let request_id = request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %request.method(),
                route = %route,
                request_id = %request_id,
            )
        }))
        .layer(set_request_id_layer())
}

async fn wait_for_shutdown(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
}

/// Serve `router` over TCP until `shutdown` fires.
pub async fn serve_tcp(
    listener: TcpListener,
    router: Router,
    shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_shutdown(shutdown))
    .await?;

    tracing::info!(address = %addr, "HTTP server stopped");
    Ok(())
}

/// Serve `router` over a Unix domain socket until `shutdown` fires.
///
/// No connect info is attached, which is how handlers recognise local-socket requests.
pub async fn serve_unix(
    listener: UnixListener,
    router: Router,
    shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    tracing::info!("Unix socket server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await?;

    tracing::info!("Unix socket server stopped");
    Ok(())
}
