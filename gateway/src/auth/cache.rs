//! Authorization decision cache
//!
//! [`CachedAuthenticator`] sits between the gateway's subscribe and publish
//! paths and a slow [`AuthBackend`]. Grants are answered from memory until
//! they expire; a background watchdog refreshes them shortly before expiry
//! and purges those whose topic fell out of use.
//!
//! The cache fails closed:
//! - a backend denial is relayed and never retained
//! - a backend failure on a miss is reported as a denial and not retained
//! - a closed cache denies everything
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use edge_gateway::auth::{AuthBackend, BackendDecision, CachedAuthenticator, ConnectionId};
//! use edge_gateway::config::CacheConfig;
//! use edge_gateway::error::BackendError;
//!
//! struct AllowAll;
//!
//! #[async_trait]
//! impl AuthBackend for AllowAll {
//!     async fn verify(&self, _: &ConnectionId, _: &str) -> Result<BackendDecision, BackendError> {
//!         Ok(BackendDecision::allow(30_000))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = CachedAuthenticator::new(CacheConfig::default(), Arc::new(AllowAll)).unwrap();
//! let connection = ConnectionId::new();
//!
//! let outcome = cache.verify(&connection, "prices/fx").await;
//! assert_eq!(outcome.ttl_millis(), Some(30_000));
//!
//! cache.close().await;
//! assert!(!cache.verify(&connection, "prices/fx").await.is_allowed());
//! # }
//! ```

use futures::FutureExt;
use garde::Validate;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use super::audit::{DecisionSource, audit_decision};
use super::backend::AuthBackend;
use super::decision::{AuthOutcome, BackendDecision, Decision};
use super::key::{CacheKey, ConnectionId};
use super::limiter::{QueryLimiter, QueryPermit};
use super::oracle::LivenessOracle;
use super::stats::{CacheStats, StatsRecorder};
use super::store::{CacheStore, Claim, QueryResult, SharedQuery};
use super::watchdog::Watchdog;
use crate::config::CacheConfig;
use crate::error::{BackendError, GatewayError, TopicAccessError};
use crate::observability::metrics::{
    QueryKind, QueryResultLabel, record_backend_query, record_cache_lookup,
};

/// Caching front for an [`AuthBackend`].
///
/// Cloning is cheap; clones share the same store and watchdog.
#[derive(Clone)]
pub struct CachedAuthenticator {
    inner: Arc<CacheInner>,
}

pub(crate) struct CacheInner {
    pub(crate) config: CacheConfig,
    backend: Arc<dyn AuthBackend>,
    pub(crate) store: CacheStore,
    pub(crate) limiter: QueryLimiter,
    pub(crate) stats: StatsRecorder,
    closed: AtomicBool,
    oracle: OnceLock<Arc<dyn LivenessOracle>>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Lifecycle {
    attached: bool,
    shutdown: Option<watch::Sender<bool>>,
    watchdog: Option<JoinHandle<()>>,
}

impl CachedAuthenticator {
    /// Build a cache over `backend`.
    ///
    /// The configuration is validated here; the watchdog does not run until
    /// [`attach`](Self::attach) is called.
    pub fn new(config: CacheConfig, backend: Arc<dyn AuthBackend>) -> Result<Self, GatewayError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(CacheInner {
                limiter: QueryLimiter::new(config.max_pending_queries),
                config,
                backend,
                store: CacheStore::new(),
                stats: StatsRecorder::default(),
                closed: AtomicBool::new(false),
                oracle: OnceLock::new(),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        })
    }

    /// Decide whether `connection` may use `topic`.
    ///
    /// A cached grant is answered without suspending, reporting the time left
    /// until it expires. Otherwise the backend is queried; concurrent callers
    /// for the same key share one query and observe the same outcome.
    pub async fn verify(&self, connection: &ConnectionId, topic: &str) -> AuthOutcome {
        let inner = &self.inner;

        if inner.is_closed() {
            let outcome = AuthOutcome::Deny(TopicAccessError::closed(topic));
            audit_decision(connection, topic, &outcome, DecisionSource::Closed);
            return outcome;
        }

        let key = CacheKey::new(*connection, topic);

        if let Some(ttl_millis) = inner.cached_ttl(&key, Instant::now()) {
            inner.stats.hit();
            record_cache_lookup(true);
            let outcome = AuthOutcome::Allow { ttl_millis };
            audit_decision(connection, topic, &outcome, DecisionSource::Cache);
            return outcome;
        }

        inner.stats.miss();
        record_cache_lookup(false);

        let query = match inner
            .store
            .try_claim(&key, || inner.start_query(key.clone(), QueryKind::Miss, None))
        {
            Claim::Acquired(query) => {
                // Must complete even if this caller is dropped.
                tokio::spawn(query.clone());
                query
            }
            Claim::InFlight(query) => {
                debug!(key = %key, "Joining in-flight backend query");
                query
            }
        };

        let result = query.await;

        if inner.is_closed() {
            let outcome = AuthOutcome::Deny(TopicAccessError::closed(topic));
            audit_decision(connection, topic, &outcome, DecisionSource::Closed);
            return outcome;
        }

        let outcome = match result {
            Ok(BackendDecision::Allow { ttl_millis }) => AuthOutcome::Allow { ttl_millis },
            Ok(BackendDecision::Denied { reason }) => {
                AuthOutcome::Deny(TopicAccessError::forbidden(topic, reason))
            }
            Err(err) => AuthOutcome::Deny(TopicAccessError::backend_unavailable(topic, &err)),
        };
        audit_decision(connection, topic, &outcome, DecisionSource::Backend);
        outcome
    }

    /// Start background maintenance against `oracle`.
    ///
    /// Only the first call on an open cache has any effect. The oracle is
    /// also handed to the backend.
    pub async fn attach(&self, oracle: Arc<dyn LivenessOracle>) {
        let mut lifecycle = self.inner.lifecycle.lock().await;

        if lifecycle.attached || self.inner.is_closed() {
            debug!("Decision cache already attached or closed, ignoring attach");
            return;
        }
        lifecycle.attached = true;

        // Only ever set here, under the lifecycle lock, after the attached check.
        let _ = self.inner.oracle.set(Arc::clone(&oracle));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watchdog = Watchdog::new(Arc::downgrade(&self.inner), Arc::clone(&oracle), shutdown_rx);
        lifecycle.watchdog = Some(tokio::spawn(watchdog.run()));
        lifecycle.shutdown = Some(shutdown_tx);

        self.inner.backend.attach(oracle).await;

        info!(
            run_interval_ms = self.inner.config.run_interval_millis,
            max_pending_queries = self.inner.config.max_pending_queries,
            "Decision cache attached"
        );
    }

    /// Stop the watchdog, drop every cached grant and close the backend.
    ///
    /// A tick already running is allowed to finish. Backend queries already
    /// dispatched are not cancelled; their results are discarded. Calling
    /// this more than once has no further effect.
    pub async fn close(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;

        if self.inner.closed.swap(true, Ordering::SeqCst) {
            debug!("Decision cache already closed");
            return;
        }

        if let Some(shutdown) = lifecycle.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(watchdog) = lifecycle.watchdog.take() {
            if let Err(err) = watchdog.await {
                warn!(error = %err, "Watchdog task ended abnormally");
            }
        }

        let dropped = self.inner.store.len();
        self.inner.store.clear();
        self.inner.backend.close().await;

        info!(dropped_entries = dropped, "Decision cache closed");
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Whether a grant is currently held for the pair, expired or not.
    pub fn contains(&self, connection: &ConnectionId, topic: &str) -> bool {
        self.inner.store.contains(&CacheKey::new(*connection, topic))
    }

    /// Number of grants held, including expired ones not yet replaced.
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Whether no grant is held.
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// The validated configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Counters since construction, with the current entry and refresh counts.
    pub fn stats(&self) -> CacheStats {
        self.inner
            .stats
            .snapshot(self.inner.store.len(), self.inner.limiter.in_flight())
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<CacheInner> {
        &self.inner
    }
}

impl CacheInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn cached_ttl(&self, key: &CacheKey, now: Instant) -> Option<u64> {
        self.store.get(key)?.decision.remaining_millis(now)
    }

    /// Build the shared query for `key`. Nothing runs until it is polled.
    ///
    /// The query applies its own result to the store and releases the claim
    /// before any waiter observes the result. A refresh holds its limiter
    /// permit until then.
    pub(crate) fn start_query(
        self: &Arc<Self>,
        key: CacheKey,
        kind: QueryKind,
        permit: Option<QueryPermit>,
    ) -> SharedQuery {
        let inner = Arc::clone(self);

        async move {
            let result = inner.query_backend(&key, kind).await;

            match kind {
                QueryKind::Miss => inner.complete_miss(&key, &result),
                QueryKind::Refresh => inner.complete_refresh(&key, &result).await,
            }

            inner.store.release(&key);
            drop(permit);
            result
        }
        .boxed()
        .shared()
    }

    async fn query_backend(&self, key: &CacheKey, kind: QueryKind) -> QueryResult {
        let started = Instant::now();
        let call = AssertUnwindSafe(self.backend.verify(&key.connection, &key.topic)).catch_unwind();

        let result = match timeout(self.config.query_timeout(), call).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BackendError::Unavailable("backend panicked".to_string())),
            Err(_) => Err(BackendError::Timeout(self.config.query_timeout_millis)),
        };

        let label = match &result {
            Ok(BackendDecision::Allow { .. }) => QueryResultLabel::Allow,
            Ok(BackendDecision::Denied { .. }) => QueryResultLabel::Deny,
            Err(_) => QueryResultLabel::Error,
        };
        record_backend_query(kind, label, started.elapsed());

        result
    }

    fn complete_miss(&self, key: &CacheKey, result: &QueryResult) {
        if self.is_closed() {
            return;
        }

        match result {
            Ok(decision @ BackendDecision::Allow { .. }) => {
                let now = Instant::now();
                if let Some(decision) = Decision::from_backend(decision, now) {
                    self.store.put(key.clone(), decision, now);
                    // close() may have cleared the store between the check above and the put.
                    if self.is_closed() {
                        self.store.remove(key);
                    }
                }
            }
            Ok(BackendDecision::Denied { reason }) => {
                // An expired grant may still be stored; the backend has now refused it.
                self.store.remove(key);
                debug!(key = %key, reason = %reason, "Backend denied topic");
            }
            Err(err) => {
                self.stats.backend_error();
                warn!(key = %key, error = %err, "Backend query failed, denying");
            }
        }
    }

    async fn complete_refresh(&self, key: &CacheKey, result: &QueryResult) {
        if self.is_closed() {
            return;
        }

        match result {
            Ok(decision @ BackendDecision::Allow { .. }) => {
                let now = Instant::now();
                let updated = Decision::from_backend(decision, now)
                    .is_some_and(|decision| self.store.update(key, decision, now));
                if updated && self.is_closed() {
                    self.store.remove(key);
                } else if updated {
                    self.stats.refreshed();
                    debug!(key = %key, "Grant refreshed");
                } else {
                    debug!(key = %key, "Grant purged during refresh, discarding result");
                }
            }
            Ok(BackendDecision::Denied { reason }) => {
                if self.store.remove(key).is_none() {
                    return;
                }
                self.stats.refresh_denied();
                info!(key = %key, reason = %reason, "Grant revoked on refresh");

                if let Some(oracle) = self.oracle.get() {
                    oracle.expire_topic(&key.connection, &key.topic).await;
                }
            }
            Err(err) => {
                self.stats.backend_error();
                warn!(key = %key, error = %err, "Refresh failed, keeping grant for retry");
            }
        }
    }
}

impl fmt::Debug for CachedAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAuthenticator")
            .field("config", &self.inner.config)
            .field("entries", &self.inner.store.len())
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl fmt::Display for CachedAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = &self.inner.config;
        write!(
            f,
            "CachedAuthenticator [runInterval={}ms, residenceTime={}ms, minQueryInterval={}ms, \
             maxPendingQueries={}, queryBeforeExpiry={}ms, entries={}]",
            config.run_interval_millis,
            config.residence_time_millis,
            config.min_query_interval_millis,
            config.max_pending_queries,
            config.query_before_expiry_millis,
            self.inner.store.len()
        )
    }
}
