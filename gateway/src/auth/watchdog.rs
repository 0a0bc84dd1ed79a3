//! Background maintenance of cached grants.
//!
//! Every `run_interval` the watchdog snapshots the store, asks the liveness
//! oracle once per connection which topics are still in use, purges grants
//! that stayed unused for the residence time and dispatches refreshes for
//! grants close to expiry. Refreshes run on their own tasks and are capped by
//! the query limiter, so a tick never waits on the backend.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, trace};

use super::cache::CacheInner;
use super::decision::Decision;
use super::key::ConnectionId;
use super::oracle::LivenessOracle;
use super::store::{CacheEntry, Claim};
use crate::config::CacheConfig;
use crate::observability::metrics::{QueryKind, record_purge, record_refresh_skipped};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub examined: usize,
    pub connections: usize,
    pub purged: usize,
    pub refreshes_dispatched: usize,
    /// Refresh-eligible but the limiter was full.
    pub deferred: usize,
    /// Refresh-eligible but a query for the key was already running.
    pub in_flight: usize,
}

pub(crate) struct Watchdog {
    inner: Weak<CacheInner>,
    oracle: Arc<dyn LivenessOracle>,
    shutdown: watch::Receiver<bool>,
}

impl Watchdog {
    pub(crate) fn new(
        inner: Weak<CacheInner>,
        oracle: Arc<dyn LivenessOracle>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            inner,
            oracle,
            shutdown,
        }
    }

    /// Tick until shutdown is signalled or the cache is dropped.
    ///
    /// Ticks never overlap. A tick that overruns its period causes the
    /// missed ticks to be skipped.
    pub(crate) async fn run(mut self) {
        let Some(period) = self.inner.upgrade().map(|inner| inner.config.run_interval()) else {
            return;
        };

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        debug!(period_ms = %period.as_millis(), "Watchdog started");

        loop {
            tokio::select! {
                biased;
                // A dropped sender means the cache itself is gone.
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let Some(inner) = self.inner.upgrade() else {
                break;
            };
            if inner.is_closed() {
                break;
            }

            let report = tick(&inner, self.oracle.as_ref(), Instant::now()).await;
            if report.purged > 0 || report.refreshes_dispatched > 0 {
                debug!(?report, "Watchdog tick");
            } else {
                trace!(?report, "Watchdog tick");
            }
        }

        info!("Watchdog stopped");
    }
}

/// One maintenance pass over the store as of `now`.
pub(crate) async fn tick(
    inner: &Arc<CacheInner>,
    oracle: &dyn LivenessOracle,
    now: Instant,
) -> TickReport {
    let mut report = TickReport::default();

    let mut by_connection: HashMap<ConnectionId, Vec<CacheEntry>> = HashMap::new();
    for entry in inner.store.snapshot() {
        by_connection
            .entry(entry.key.connection)
            .or_default()
            .push(entry);
    }
    report.connections = by_connection.len();

    for (connection, entries) in by_connection {
        let active = oracle.active_topics(&connection).await;

        for entry in entries {
            report.examined += 1;

            if purge_if_inactive(inner, &entry, &active, now) {
                report.purged += 1;
                continue;
            }

            if !is_refresh_eligible(&entry, &inner.config, now) {
                continue;
            }

            if entry.query_in_flight {
                report.in_flight += 1;
                inner.stats.refresh_skipped();
                record_refresh_skipped("in_flight");
                continue;
            }

            let Some(permit) = inner.limiter.try_acquire() else {
                report.deferred += 1;
                inner.stats.refresh_skipped();
                record_refresh_skipped("limiter_full");
                continue;
            };

            // An unused permit is dropped along with the closure.
            let claim = inner.store.try_claim(&entry.key, || {
                inner.start_query(entry.key.clone(), QueryKind::Refresh, Some(permit))
            });

            match claim {
                Claim::Acquired(query) => {
                    trace!(key = %entry.key, "Dispatching refresh");
                    tokio::spawn(query);
                    report.refreshes_dispatched += 1;
                }
                Claim::InFlight(_) => {
                    report.in_flight += 1;
                    inner.stats.refresh_skipped();
                    record_refresh_skipped("in_flight");
                }
            }
        }
    }

    report
}

/// Purge `entry` if its topic has been inactive for at least the residence
/// time. Returns whether the entry was removed.
fn purge_if_inactive(
    inner: &CacheInner,
    entry: &CacheEntry,
    active: &HashSet<String>,
    now: Instant,
) -> bool {
    let is_active = active.contains(&entry.key.topic);
    let Some(inactive_since) = inner.store.observe_activity(&entry.key, is_active, now) else {
        return false;
    };

    if now.saturating_duration_since(inactive_since) < inner.config.residence_time() {
        return false;
    }

    if inner.store.remove(&entry.key).is_none() {
        return false;
    }

    inner.stats.purged();
    record_purge();
    debug!(key = %entry.key, "Purged inactive grant");
    true
}

/// Whether a finite grant is due for a background refresh at `now`.
///
/// Indefinite grants are never refreshed.
pub fn is_refresh_eligible(entry: &CacheEntry, config: &CacheConfig, now: Instant) -> bool {
    let Decision::Allow { valid_until } = entry.decision else {
        return false;
    };

    let remaining = valid_until.saturating_duration_since(now);
    let since_query = now.saturating_duration_since(entry.last_queried_at);

    remaining <= config.query_before_expiry() && since_query >= config.min_query_interval()
}
