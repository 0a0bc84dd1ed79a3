//! Connection liveness oracles
//!
//! The watchdog consults a [`LivenessOracle`] to learn which topics each
//! connection still uses, and tells it when a grant has been withdrawn so the
//! connection can stop receiving the topic.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::key::ConnectionId;

/// Capacity of the expiry notification channel.
const EXPIRY_CHANNEL_CAPACITY: usize = 1024;

#[async_trait]
pub trait LivenessOracle: Send + Sync {
    /// Topics the connection currently has in use.
    async fn active_topics(&self, connection: &ConnectionId) -> HashSet<String>;

    /// The connection's grant for `topic` was refused on re-check.
    async fn expire_topic(&self, connection: &ConnectionId, topic: &str);
}

/// Oracle for publish-side checks.
///
/// Publishing holds no standing topic state, so nothing is ever reported as
/// active and cached publish grants age out after the residence time.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishOracle;

#[async_trait]
impl LivenessOracle for PublishOracle {
    async fn active_topics(&self, _connection: &ConnectionId) -> HashSet<String> {
        HashSet::new()
    }

    async fn expire_topic(&self, connection: &ConnectionId, topic: &str) {
        debug!(connection = %connection, topic = %topic, "Publish grant expired");
    }
}

/// A subscription withdrawn because its grant expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicExpiry {
    pub connection: ConnectionId,
    pub topic: String,
}

/// Subscription bookkeeping for subscribe-side checks.
///
/// Reports each connection's subscribed topics as active. An expiry drops the
/// subscription and is broadcast so the transport can close it.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<ConnectionId, HashSet<String>>,
    expiries: broadcast::Sender<TopicExpiry>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        let (expiries, _) = broadcast::channel(EXPIRY_CHANNEL_CAPACITY);
        Self {
            sessions: DashMap::new(),
            expiries,
        }
    }

    pub fn subscribe(&self, connection: ConnectionId, topic: impl Into<String>) {
        self.sessions
            .entry(connection)
            .or_default()
            .insert(topic.into());
    }

    pub fn unsubscribe(&self, connection: &ConnectionId, topic: &str) -> bool {
        let removed = match self.sessions.get_mut(connection) {
            Some(mut topics) => topics.remove(topic),
            None => false,
        };
        self.sessions.remove_if(connection, |_, topics| topics.is_empty());
        removed
    }

    /// Forget every subscription held by a connection.
    pub fn disconnect(&self, connection: &ConnectionId) {
        self.sessions.remove(connection);
    }

    pub fn is_subscribed(&self, connection: &ConnectionId, topic: &str) -> bool {
        self.sessions
            .get(connection)
            .is_some_and(|topics| topics.contains(topic))
    }

    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Receive a notification for every subscription dropped by expiry.
    pub fn expiries(&self) -> broadcast::Receiver<TopicExpiry> {
        self.expiries.subscribe()
    }
}

#[async_trait]
impl LivenessOracle for SessionRegistry {
    async fn active_topics(&self, connection: &ConnectionId) -> HashSet<String> {
        self.sessions
            .get(connection)
            .map(|topics| topics.clone())
            .unwrap_or_default()
    }

    async fn expire_topic(&self, connection: &ConnectionId, topic: &str) {
        if !self.unsubscribe(connection, topic) {
            debug!(connection = %connection, topic = %topic, "Expired topic was not subscribed");
            return;
        }

        info!(connection = %connection, topic = %topic, "Subscription closed after grant expired");

        // No receivers is fine; nobody is watching for closures.
        let _ = self.expiries.send(TopicExpiry {
            connection: *connection,
            topic: topic.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_oracle_reports_nothing_active() {
        let oracle = PublishOracle;
        let connection = ConnectionId::new();

        assert!(oracle.active_topics(&connection).await.is_empty());
        oracle.expire_topic(&connection, "t").await;
    }

    #[tokio::test]
    async fn test_registry_reports_subscribed_topics() {
        let registry = SessionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();

        registry.subscribe(a, "alpha");
        registry.subscribe(a, "beta");
        registry.subscribe(b, "gamma");

        let topics = registry.active_topics(&a).await;
        assert_eq!(topics.len(), 2);
        assert!(topics.contains("alpha") && topics.contains("beta"));
        assert!(registry.active_topics(&ConnectionId::new()).await.is_empty());
        assert_eq!(registry.connection_count(), 2);
    }

    #[tokio::test]
    async fn test_expire_closes_subscribed_topic() {
        let registry = SessionRegistry::new();
        let mut expiries = registry.expiries();
        let connection = ConnectionId::new();
        registry.subscribe(connection, "alpha");

        registry.expire_topic(&connection, "alpha").await;

        assert!(!registry.is_subscribed(&connection, "alpha"));
        assert_eq!(registry.connection_count(), 0);
        let expiry = expiries.recv().await.unwrap();
        assert_eq!(expiry.connection, connection);
        assert_eq!(expiry.topic, "alpha");
    }

    #[tokio::test]
    async fn test_expire_ignores_unsubscribed_topic() {
        let registry = SessionRegistry::new();
        let mut expiries = registry.expiries();
        let connection = ConnectionId::new();
        registry.subscribe(connection, "alpha");

        registry.expire_topic(&connection, "beta").await;

        assert!(registry.is_subscribed(&connection, "alpha"));
        assert!(expiries.try_recv().is_err());
    }

    #[test]
    fn test_disconnect_forgets_connection() {
        let registry = SessionRegistry::new();
        let connection = ConnectionId::new();
        registry.subscribe(connection, "alpha");
        registry.disconnect(&connection);
        assert!(!registry.is_subscribed(&connection, "alpha"));
        assert!(!registry.unsubscribe(&connection, "alpha"));
    }
}
