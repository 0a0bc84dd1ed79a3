//! Concurrent store of cached grants and in-flight backend queries.
//!
//! Two maps are kept: `entries` holds granted decisions, `pending` holds the
//! shared future of every backend query currently running for a key. A key
//! is claimed when it has a pending query.
//!
//! Lock order: a guard on `entries` is never held while `pending` is locked.
//! Every method here acquires at most one map guard at a time.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use super::decision::{BackendDecision, Decision};
use super::key::CacheKey;
use crate::error::BackendError;

/// Result of one backend query, cloned out to every waiter.
pub type QueryResult = Result<BackendDecision, BackendError>;

/// A backend query that any number of callers can await.
pub type SharedQuery = Shared<BoxFuture<'static, QueryResult>>;

/// A granted decision held for one connection and topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub decision: Decision,
    /// When the backend last answered for this key.
    pub last_queried_at: Instant,
    /// Whether a backend query for this key is running. Only meaningful in
    /// snapshots.
    pub query_in_flight: bool,
    /// Start of the current stretch in which the topic was seen inactive.
    pub inactive_since: Option<Instant>,
}

/// Outcome of [`CacheStore::try_claim`].
pub enum Claim {
    /// The caller owns the new query and must drive it and release the key.
    Acquired(SharedQuery),
    /// Another query is already running; await it instead.
    InFlight(SharedQuery),
}

/// Grants and in-flight queries, keyed by connection and topic.
#[derive(Default)]
pub struct CacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
    pending: DashMap<CacheKey, SharedQuery>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the grant for `key`, expired or not.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    /// Whether a grant is held for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace the grant for `key`, answered by the backend at `now`.
    pub fn put(&self, key: CacheKey, decision: Decision, now: Instant) {
        let entry = CacheEntry {
            key: key.clone(),
            decision,
            last_queried_at: now,
            query_in_flight: false,
            inactive_since: None,
        };
        self.entries.insert(key, entry);
    }

    /// Replace the grant for `key` only if the key is still cached.
    ///
    /// Returns `false` when the entry was removed in the meantime, in which
    /// case nothing is written.
    pub fn update(&self, key: &CacheKey, decision: Decision, now: Instant) -> bool {
        match self.entries.get_mut(key) {
            Some(mut entry) => {
                entry.decision = decision;
                entry.last_queried_at = now;
                true
            }
            None => false,
        }
    }

    /// Drop the grant for `key`, returning it if one was held.
    pub fn remove(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    /// Claim `key` for a backend query.
    ///
    /// `start` builds the query and is only called when no query is running
    /// for the key. It runs under the pending map's shard lock and must not
    /// touch the store.
    pub fn try_claim<F>(&self, key: &CacheKey, start: F) -> Claim
    where
        F: FnOnce() -> SharedQuery,
    {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(occupied) => Claim::InFlight(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let query = start();
                vacant.insert(query.clone());
                Claim::Acquired(query)
            }
        }
    }

    /// End the claim on `key` so the next caller starts a fresh query.
    pub fn release(&self, key: &CacheKey) {
        self.pending.remove(key);
    }

    /// Whether a backend query is running for `key`.
    pub fn is_claimed(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Record whether the topic was seen active at `now`.
    ///
    /// Returns the instant the entry was first seen inactive, or `None` when
    /// the topic is active or the entry is gone.
    pub fn observe_activity(&self, key: &CacheKey, active: bool, now: Instant) -> Option<Instant> {
        let mut entry = self.entries.get_mut(key)?;
        if active {
            entry.inactive_since = None;
            None
        } else {
            Some(*entry.inactive_since.get_or_insert(now))
        }
    }

    /// Point-in-time copy of every entry.
    ///
    /// Entries are copied before `pending` is consulted so no entries guard
    /// is held while checking for in-flight queries.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for entry in &mut entries {
            entry.query_in_flight = self.pending.contains_key(&entry.key);
        }
        entries
    }

    /// Number of grants held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys with a backend query running.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop every grant. Queries already running are left to finish.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
