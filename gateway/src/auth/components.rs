//! Authorization components for the gateway's connection handlers
//!
//! The gateway checks publish and subscribe attempts against separate
//! backends, each behind its own decision cache. This bundle builds both from
//! one [`CacheConfig`] and manages their lifecycle together.

use std::sync::Arc;

use super::backend::AuthBackend;
use super::cache::CachedAuthenticator;
use super::oracle::{LivenessOracle, PublishOracle};
use super::stats::CacheStats;
use crate::config::CacheConfig;
use crate::error::GatewayError;

/// Decision caches for both directions of traffic.
#[derive(Clone, Debug)]
pub struct AuthorizationComponents {
    /// Checks a connection may publish to a topic.
    pub publish: CachedAuthenticator,
    /// Checks a connection may subscribe to a topic.
    pub subscribe: CachedAuthenticator,
}

impl AuthorizationComponents {
    pub fn new(
        config: &CacheConfig,
        publish_backend: Arc<dyn AuthBackend>,
        subscribe_backend: Arc<dyn AuthBackend>,
    ) -> Result<Self, GatewayError> {
        Ok(Self {
            publish: CachedAuthenticator::new(config.clone(), publish_backend)?,
            subscribe: CachedAuthenticator::new(config.clone(), subscribe_backend)?,
        })
    }

    /// Start background maintenance for both caches.
    ///
    /// Subscribe grants are kept alive by `subscriptions`; publish grants have
    /// no standing activity and are purged after the residence time.
    pub async fn attach(&self, subscriptions: Arc<dyn LivenessOracle>) {
        self.publish.attach(Arc::new(PublishOracle)).await;
        self.subscribe.attach(subscriptions).await;
    }

    pub async fn close(&self) {
        self.publish.close().await;
        self.subscribe.close().await;
    }

    /// Statistics as `(publish, subscribe)`.
    pub fn stats(&self) -> (CacheStats, CacheStats) {
        (self.publish.stats(), self.subscribe.stats())
    }
}
