//! `GET /event-stream`: realtime updates over Server-Sent Events.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::{wrappers::BroadcastStream, StreamExt};

use crate::client::PushEvent;
use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Interval between keep-alive comments on idle streams.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn to_sse(push: PushEvent) -> Event {
    let mut event = Event::default().data(push.data);
    if let Some(id) = push.id {
        event = event.id(id);
    }
    if let Some(name) = push.event {
        event = event.event(name);
    }
    event
}

pub async fn event_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let not_found = || ApiError::NotFound("Realtime updates are not enabled".to_string());
    let broadcaster = state.broadcaster.as_ref().ok_or_else(not_found)?;
    let receiver = broadcaster
        .subscribe(state.instance.sdk_key.expose())
        .ok_or_else(not_found)?;

    tracing::info!("Client connected to event stream");

    let stream = BroadcastStream::new(receiver).filter_map(|result| match result {
        Ok(push) => Some(Ok::<_, Infallible>(to_sse(push))),
        Err(e) => {
            tracing::debug!(error = %e, "Event stream subscriber lagged");
            None
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}
