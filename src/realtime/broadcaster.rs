//! Push-event fan-out to SSE subscribers.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use crate::client::PushEvent;

/// Events buffered per channel before slow subscribers start skipping.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Broadcasts push events to subscribers grouped by channel name.
pub struct Broadcaster {
    channels: DashMap<String, broadcast::Sender<PushEvent>>,
    capacity: usize,
    closed: AtomicBool,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    /// Subscribe to `channel`. Returns `None` once the broadcaster is closed.
    pub fn subscribe(&self, channel: &str) -> Option<broadcast::Receiver<PushEvent>> {
        if self.is_closed() {
            return None;
        }
        let receiver = self
            .channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        // A close that raced the insert has already cleared the map.
        if self.is_closed() {
            self.channels.remove(channel);
            return None;
        }
        tracing::debug!(subscribers = self.subscriber_count(channel), "Stream subscriber attached");
        Some(receiver)
    }

    /// Publish `event` to every subscriber of each channel. Returns the number of
    /// receivers reached; channels without subscribers are skipped.
    pub fn publish(&self, channels: &[String], event: PushEvent) -> usize {
        let mut delivered = 0;
        for channel in channels {
            if let Some(sender) = self.channels.get(channel) {
                delivered += sender.send(event.clone()).unwrap_or(0);
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop every channel so subscriber streams end. Later subscribes are refused.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.channels.clear();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
