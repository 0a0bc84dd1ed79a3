use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics::set_pending_refreshes;

/// Non-blocking admission gate for background refresh queries.
///
/// At most `capacity` permits are outstanding. A full limiter refuses
/// immediately; callers skip the work and try again on a later tick.
#[derive(Debug, Clone)]
pub struct QueryLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Admission for one background query. Dropping it frees the slot.
#[derive(Debug)]
pub struct QueryPermit {
    _permit: OwnedSemaphorePermit,
    limiter: QueryLimiter,
}

impl QueryLimiter {
    /// A limiter admitting at most `capacity` concurrent queries.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a slot if one is free, without waiting.
    pub fn try_acquire(&self) -> Option<QueryPermit> {
        let permit = self.semaphore.clone().try_acquire_owned().ok()?;
        set_pending_refreshes(self.in_flight());
        Some(QueryPermit {
            _permit: permit,
            limiter: self.clone(),
        })
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Maximum number of permits outstanding at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for QueryPermit {
    fn drop(&mut self) {
        // The semaphore permit is released after this body runs.
        set_pending_refreshes(self.limiter.in_flight().saturating_sub(1));
    }
}
