//! Shared utilities for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Bytes},
    extract::Request,
    http::{HeaderMap, Method},
    response::Response,
    Router,
};
use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use bucketing_proxy::client::{
    ClientError, ClientEvent, ClientFactory, ClientOptions, EvaluationClient, Event, Feature,
    RawConfig, User, Variable,
};
use bucketing_proxy::config::{ProxyInstance, SdkKey};

pub const SERVER_KEY: &str = "dvc_server_abc";

/// In-memory evaluation client with scripted answers.
#[derive(Default)]
pub struct MockClient {
    pub variables: Mutex<BTreeMap<String, Variable>>,
    pub features: Mutex<BTreeMap<String, Feature>>,
    /// Event types whose `track` call fails.
    pub failing_event_types: Mutex<HashSet<String>>,
    /// Every `track` attempt, successful or not.
    pub track_attempts: Mutex<Vec<(User, Event)>>,
    pub raw: Mutex<Option<RawConfig>>,
    pub fail_evaluation: AtomicBool,
    pub closed: AtomicBool,
    pub sink: Mutex<Option<mpsc::Sender<ClientEvent>>>,
}

impl MockClient {
    pub fn with_variable(self, key: &str, value: serde_json::Value) -> Self {
        self.variables.lock().unwrap().insert(
            key.to_string(),
            Variable {
                id: Some(format!("{key}-id")),
                key: key.to_string(),
                variable_type: "String".to_string(),
                value,
                defaulted: false,
            },
        );
        self
    }

    pub fn with_raw_config(self, body: &str, etag: &str, last_modified: &str) -> Self {
        *self.raw.lock().unwrap() = Some(RawConfig {
            body: Bytes::copy_from_slice(body.as_bytes()),
            etag: etag.to_string(),
            last_modified: last_modified.to_string(),
        });
        self
    }

    pub fn failing_event(self, event_type: &str) -> Self {
        self.failing_event_types
            .lock()
            .unwrap()
            .insert(event_type.to_string());
        self
    }

    /// Clone of the event sink handed over by the factory.
    pub fn sink(&self) -> Option<mpsc::Sender<ClientEvent>> {
        self.sink.lock().unwrap().clone()
    }

    fn evaluation_result(&self) -> Result<(), ClientError> {
        if self.fail_evaluation.load(Ordering::SeqCst) {
            Err(ClientError::Other("evaluation backend down".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EvaluationClient for MockClient {
    async fn variable(&self, _user: &User, key: &str) -> Result<Variable, ClientError> {
        self.evaluation_result()?;
        Ok(self
            .variables
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Variable::defaulted(key)))
    }

    async fn all_variables(&self, _user: &User) -> Result<BTreeMap<String, Variable>, ClientError> {
        self.evaluation_result()?;
        Ok(self.variables.lock().unwrap().clone())
    }

    async fn all_features(&self, _user: &User) -> Result<BTreeMap<String, Feature>, ClientError> {
        self.evaluation_result()?;
        Ok(self.features.lock().unwrap().clone())
    }

    async fn track(&self, user: &User, event: Event) -> Result<(), ClientError> {
        let fails = self
            .failing_event_types
            .lock()
            .unwrap()
            .contains(&event.event_type);
        self.track_attempts
            .lock()
            .unwrap()
            .push((user.clone(), event));
        if fails {
            Err(ClientError::Other("track rejected".to_string()))
        } else {
            Ok(())
        }
    }

    async fn raw_config(&self) -> Result<RawConfig, ClientError> {
        self.raw.lock().unwrap().clone().ok_or(ClientError::NotReady)
    }

    async fn close(&self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::SeqCst);
        self.sink.lock().unwrap().take();
        Ok(())
    }
}

/// Factory handing out one shared [`MockClient`].
pub struct MockFactory {
    pub client: Arc<MockClient>,
    pub fail: bool,
    pub builds: AtomicUsize,
}

impl MockFactory {
    pub fn new(client: MockClient) -> Self {
        Self {
            client: Arc::new(client),
            fail: false,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(MockClient::default())
        }
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn build(
        &self,
        _sdk_key: &SdkKey,
        options: ClientOptions,
    ) -> Result<Arc<dyn EvaluationClient>, ClientError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::Other("cannot reach config CDN".to_string()));
        }
        *self.client.sink.lock().unwrap() = options.event_sink;
        Ok(self.client.clone())
    }
}

/// An instance with only the fields a test cares about.
pub fn instance() -> ProxyInstance {
    let mut instance = ProxyInstance {
        sdk_key: SdkKey::new(SERVER_KEY),
        sse_hostname: "proxy.test".to_string(),
        ..ProxyInstance::default()
    };
    instance.apply_defaults();
    instance
}

/// One request received by a mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

/// Start an axum mock upstream on an ephemeral port answering every request with
/// `respond`. Returns its address and the requests it received.
pub async fn start_upstream<F>(respond: F) -> (SocketAddr, Recorded)
where
    F: Fn(&RecordedRequest) -> Response + Send + Sync + 'static,
{
    let recorded: Recorded = Arc::default();
    let respond = Arc::new(respond);

    let app = Router::new().fallback({
        let recorded = recorded.clone();
        move |request: Request| {
            let recorded = recorded.clone();
            let respond = respond.clone();
            async move {
                let (parts, body) = request.into_parts();
                let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
                let captured = RecordedRequest {
                    method: parts.method,
                    path: parts.uri.path().to_string(),
                    headers: parts.headers,
                    body,
                };
                let response = respond(&captured);
                recorded.lock().unwrap().push(captured);
                response
            }
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, recorded)
}

/// A TCP port nothing is listening on right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
