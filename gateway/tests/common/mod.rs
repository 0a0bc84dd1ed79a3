//! Test doubles for the decision backend and the liveness oracle.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edge_gateway::auth::{AuthBackend, BackendDecision, ConnectionId, LivenessOracle};
use edge_gateway::config::CacheConfig;
use edge_gateway::error::BackendError;

/// Tracks how many callers are inside a section at once.
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn reset_peak(&self) {
        self.peak
            .store(self.current.load(Ordering::SeqCst), Ordering::SeqCst);
    }
}

/// Backend whose answer and latency can be changed while a test runs.
pub struct FakeBackend {
    calls: AtomicUsize,
    response: Mutex<Result<BackendDecision, BackendError>>,
    delay: Mutex<Duration>,
    pub concurrency: ConcurrencyGauge,
    attached: AtomicUsize,
    closed: AtomicUsize,
}

impl FakeBackend {
    pub fn new(response: Result<BackendDecision, BackendError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(response),
            delay: Mutex::new(Duration::ZERO),
            concurrency: ConcurrencyGauge::default(),
            attached: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        })
    }

    /// Allows every topic for `ttl_millis`; -1 denies every topic.
    pub fn timed_allow(ttl_millis: i64) -> Arc<Self> {
        Self::new(Ok(Self::decision_for(ttl_millis)))
    }

    fn decision_for(ttl_millis: i64) -> BackendDecision {
        if ttl_millis < 0 {
            BackendDecision::denied("denied by test backend")
        } else {
            BackendDecision::allow(ttl_millis as u64)
        }
    }

    pub fn set_ttl(&self, ttl_millis: i64) {
        self.set_response(Ok(Self::decision_for(ttl_millis)));
    }

    pub fn set_response(&self, response: Result<BackendDecision, BackendError>) {
        *self.response.lock().unwrap() = response;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn attach_count(&self) -> usize {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn verify(
        &self,
        _connection: &ConnectionId,
        _topic: &str,
    ) -> Result<BackendDecision, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.concurrency.enter();

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self.response.lock().unwrap().clone();
        self.concurrency.exit();
        response
    }

    async fn attach(&self, _oracle: Arc<dyn LivenessOracle>) {
        self.attached.fetch_add(1, Ordering::SeqCst);
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Oracle with a settable active-topic set per connection.
#[derive(Default)]
pub struct FakeOracle {
    active: Mutex<HashMap<ConnectionId, HashSet<String>>>,
    expired: Mutex<Vec<(ConnectionId, String)>>,
    active_calls: AtomicUsize,
    delay: Mutex<Duration>,
    pub concurrency: ConcurrencyGauge,
}

impl FakeOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn activate(&self, connection: ConnectionId, topic: &str) {
        self.active
            .lock()
            .unwrap()
            .entry(connection)
            .or_default()
            .insert(topic.to_string());
    }

    pub fn deactivate(&self, connection: &ConnectionId, topic: &str) {
        if let Some(topics) = self.active.lock().unwrap().get_mut(connection) {
            topics.remove(topic);
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn expired(&self) -> Vec<(ConnectionId, String)> {
        self.expired.lock().unwrap().clone()
    }

    pub fn expire_count(&self, connection: &ConnectionId, topic: &str) -> usize {
        self.expired
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, t)| c == connection && t == topic)
            .count()
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LivenessOracle for FakeOracle {
    async fn active_topics(&self, connection: &ConnectionId) -> HashSet<String> {
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        self.concurrency.enter();

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let topics = self
            .active
            .lock()
            .unwrap()
            .get(connection)
            .cloned()
            .unwrap_or_default();
        self.concurrency.exit();
        topics
    }

    async fn expire_topic(&self, connection: &ConnectionId, topic: &str) {
        self.expired
            .lock()
            .unwrap()
            .push((*connection, topic.to_string()));
    }
}

/// Fast-ticking configuration used by most tests.
pub fn fast_config() -> CacheConfig {
    CacheConfig::default().with_run_interval_millis(10)
}
