//! Cloud bucketing client.
//!
//! # Responsibilities
//! - Poll the config CDN for the instance's configuration document
//! - Announce new documents on the event sink (realtime updates included)
//! - Delegate variable and feature evaluation to the remote bucketing API
//! - Queue custom events and flush them to the events API
//!
//! # Design Decisions
//! - Two background tasks (poller, flusher) stopped through a watch channel
//! - The event sink is only ever written with `try_send`; a full channel drops
//! - A failed flush drops its batch rather than growing the queue unbounded

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, ETAG, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use url::Url;

use crate::client::{
    ClientError, ClientEvent, ClientFactory, ClientOptions, EvaluationClient, Event, Feature,
    PushEvent, RawConfig, User, Variable,
};
use crate::config::SdkKey;

/// Builds [`CloudClient`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloudClientFactory;

#[async_trait]
impl ClientFactory for CloudClientFactory {
    async fn build(
        &self,
        sdk_key: &SdkKey,
        options: ClientOptions,
    ) -> Result<Arc<dyn EvaluationClient>, ClientError> {
        let client = CloudClient::start(sdk_key.clone(), options).await?;
        Ok(Arc::new(client))
    }
}

struct QueuedEvent {
    user: User,
    event: Event,
}

struct Shared {
    sdk_key: SdkKey,
    options: ClientOptions,
    http: reqwest::Client,
    config: RwLock<Option<RawConfig>>,
    queue: Mutex<Vec<QueuedEvent>>,
    sink: Mutex<Option<mpsc::Sender<ClientEvent>>>,
    flush_now: Notify,
}

/// Evaluation client backed by the hosted bucketing and events APIs.
pub struct CloudClient {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl CloudClient {
    /// Create the client, load the first configuration and start background work.
    ///
    /// A failed first load is logged; the poller keeps trying.
    pub async fn start(sdk_key: SdkKey, mut options: ClientOptions) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;
        let sink = options.event_sink.take();

        let shared = Arc::new(Shared {
            sdk_key,
            options,
            http,
            config: RwLock::new(None),
            queue: Mutex::new(Vec::new()),
            sink: Mutex::new(sink),
            flush_now: Notify::new(),
        });

        if let Err(e) = shared.fetch_config().await {
            tracing::warn!(error = %e, "Initial config fetch failed, will retry on next poll");
            shared.emit(ClientEvent::Error(e.to_string()));
        }

        let (shutdown, _) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(poll_config(shared.clone(), shutdown.subscribe())),
            tokio::spawn(flush_events(shared.clone(), shutdown.subscribe())),
        ];

        tracing::info!(
            polling_interval_ms = shared.options.config_polling_interval.as_millis() as u64,
            flush_interval_ms = shared.options.event_flush_interval.as_millis() as u64,
            "Cloud client started"
        );

        Ok(Self {
            shared,
            shutdown,
            tasks: Mutex::new(tasks),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ClientError::Closed)
        } else {
            Ok(())
        }
    }

    async fn evaluate<T>(&self, path: &[&str], user: &User) -> Result<T, ClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.shared.bucketing_request(path, user).await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }
        Ok(response.json::<T>().await?)
    }
}

impl Shared {
    fn emit(&self, event: ClientEvent) {
        let sink = self.sink.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = sink.as_ref() else {
            return;
        };
        if let Err(e) = tx.try_send(event) {
            tracing::warn!(error = %e, "Dropping client event, event sink unavailable");
        }
    }

    fn config_url(&self) -> String {
        format!(
            "{}/config/v2/server/{}.json",
            self.options.config_cdn_uri.trim_end_matches('/'),
            self.sdk_key.expose()
        )
    }

    async fn fetch_config(&self) -> Result<(), ClientError> {
        let current_etag = self
            .config
            .read()
            .await
            .as_ref()
            .map(|c| c.etag.clone())
            .filter(|etag| !etag.is_empty());

        let mut request = self.http.get(self.config_url());
        if let Some(etag) = current_etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            tracing::trace!("Config not modified");
            return Ok(());
        }
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let etag = header_value(response.headers(), ETAG);
        let last_modified = header_value(response.headers(), LAST_MODIFIED);
        let body = response.bytes().await?;

        let first_load = {
            let mut config = self.config.write().await;
            let first_load = config.is_none();
            *config = Some(RawConfig {
                body,
                etag: etag.clone(),
                last_modified: last_modified.clone(),
            });
            first_load
        };

        if first_load {
            tracing::info!(etag = %etag, "Config loaded");
            self.emit(ClientEvent::Initialized);
            return Ok(());
        }

        tracing::info!(etag = %etag, "Config updated");
        self.emit(ClientEvent::ConfigUpdated { etag: etag.clone() });
        if !self.options.disable_realtime_updates {
            let data = json!({
                "type": "refetchConfig",
                "etag": etag,
                "lastModified": last_modified,
            });
            self.emit(ClientEvent::RealtimeUpdate(PushEvent::message(data.to_string())));
        }
        Ok(())
    }

    async fn bucketing_request(
        &self,
        path: &[&str],
        user: &User,
    ) -> Result<reqwest::Response, ClientError> {
        let url = bucketing_url(&self.options.bucketing_api_uri, path)?;
        Ok(self
            .http
            .post(url)
            .header(AUTHORIZATION, self.sdk_key.expose())
            .json(user)
            .send()
            .await?)
    }

    async fn flush(&self) {
        let queued = {
            let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *queue)
        };
        if queued.is_empty() {
            return;
        }

        let count = queued.len();
        let body = batch_body(queued);
        let url = format!(
            "{}/v1/events/batch",
            self.options.events_api_uri.trim_end_matches('/')
        );

        let result = self
            .http
            .post(url)
            .header(AUTHORIZATION, self.sdk_key.expose())
            .json(&body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(events = count, "Flushed events");
            }
            Ok(response) => {
                tracing::warn!(events = count, status = %response.status(), "Events API rejected batch, dropping events");
            }
            Err(e) => {
                tracing::warn!(events = count, error = %e, "Failed to flush events, dropping events");
            }
        }
    }
}

/// Group queued events by user into an events API batch.
fn batch_body(queued: Vec<QueuedEvent>) -> Value {
    let mut groups: BTreeMap<String, (User, Vec<Value>)> = BTreeMap::new();
    for QueuedEvent { user, event } in queued {
        let entry = groups
            .entry(user.user_id.clone())
            .or_insert_with(|| (user.clone(), Vec::new()));
        entry.1.push(json!({
            "type": "customEvent",
            "customType": event.event_type,
            "target": event.target,
            "value": event.value,
            "date": event.date,
            "metaData": event.meta_data,
            "user_id": user.user_id,
        }));
    }

    let batch: Vec<Value> = groups
        .into_values()
        .map(|(user, events)| json!({ "user": user, "events": events }))
        .collect();
    json!({ "batch": batch })
}

/// Append `segments` to the bucketing API base, percent-encoding each one.
fn bucketing_url(base: &str, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = Url::parse(base)
        .map_err(|e| ClientError::Other(format!("invalid bucketing API URI: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::Other("bucketing API URI cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn header_value(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn poll_config(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval(shared.options.config_polling_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial load already happened.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = shared.fetch_config().await {
                    tracing::warn!(error = %e, "Config poll failed");
                    shared.emit(ClientEvent::Error(e.to_string()));
                }
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Config poller stopped");
}

async fn flush_events(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = time::interval(shared.options.event_flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shared.flush_now.notified() => {}
            _ = shutdown.changed() => break,
        }
        shared.flush().await;
    }
    tracing::debug!("Event flusher stopped");
}

#[async_trait]
impl EvaluationClient for CloudClient {
    async fn variable(&self, user: &User, key: &str) -> Result<Variable, ClientError> {
        self.ensure_open()?;
        // Dot segments would be normalized away and address another resource.
        if key == "." || key == ".." {
            return Ok(Variable::defaulted(key));
        }
        let response = self
            .shared
            .bucketing_request(&["v1", "variables", key], user)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Variable::defaulted(key));
        }
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }
        Ok(response.json::<Variable>().await?)
    }

    async fn all_variables(&self, user: &User) -> Result<BTreeMap<String, Variable>, ClientError> {
        self.ensure_open()?;
        self.evaluate(&["v1", "variables"], user).await
    }

    async fn all_features(&self, user: &User) -> Result<BTreeMap<String, Feature>, ClientError> {
        self.ensure_open()?;
        self.evaluate(&["v1", "features"], user).await
    }

    async fn track(&self, user: &User, event: Event) -> Result<(), ClientError> {
        self.ensure_open()?;
        if self.shared.options.disable_custom_event_logging {
            return Err(ClientError::EventsDisabled);
        }

        let queued = {
            let mut queue = self.shared.queue.lock().unwrap_or_else(|e| e.into_inner());
            if queue.len() >= self.shared.options.max_event_queue_size {
                return Err(ClientError::QueueFull(queue.len()));
            }
            queue.push(QueuedEvent {
                user: user.clone(),
                event,
            });
            queue.len()
        };

        if queued >= self.shared.options.flush_event_queue_size {
            self.shared.flush_now.notify_one();
        }
        Ok(())
    }

    async fn raw_config(&self) -> Result<RawConfig, ClientError> {
        self.shared
            .config
            .read()
            .await
            .clone()
            .ok_or(ClientError::NotReady)
    }

    async fn close(&self) -> Result<(), ClientError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.shutdown.send(true);
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Client background task ended abnormally");
            }
        }

        self.shared.flush().await;
        self.shared
            .sink
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        tracing::info!("Cloud client closed");
        Ok(())
    }
}
