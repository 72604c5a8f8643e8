//! Background task relaying realtime updates from the evaluation client.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::ClientEvent;
use crate::observability::metrics;
use crate::realtime::Broadcaster;

/// Start the rebroadcaster for one instance. Runs until every sender of
/// `events` is dropped.
pub fn spawn_rebroadcaster(
    mut events: mpsc::Receiver<ClientEvent>,
    broadcaster: Arc<Broadcaster>,
    channel: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let channels = [channel];
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::RealtimeUpdate(push) => {
                    tracing::info!(data = %push.data, "Rebroadcasting realtime event");
                    let delivered = broadcaster.publish(&channels, push);
                    metrics::record_rebroadcast();
                    tracing::debug!(delivered, "Realtime event published");
                }
                other => {
                    tracing::debug!(kind = other.kind(), "Ignoring client event");
                }
            }
        }
        tracing::debug!("Client event channel closed, rebroadcaster stopping");
    })
}
