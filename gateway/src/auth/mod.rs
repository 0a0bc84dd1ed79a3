//! Topic authorization for the edge gateway.
//!
//! Every subscribe and publish attempt is checked through a
//! [`CachedAuthenticator`], which answers from cached grants where it can and
//! falls back to a pluggable [`AuthBackend`] otherwise.

pub mod audit;
pub mod backend;
pub mod cache;
pub mod components;
pub mod decision;
pub mod key;
pub mod limiter;
pub mod oracle;
pub mod stats;
pub mod store;
pub mod watchdog;

pub use audit::{AuditEntry, DecisionSource};
pub use backend::AuthBackend;
pub use cache::CachedAuthenticator;
pub use components::AuthorizationComponents;
pub use decision::{AuthOutcome, BackendDecision, Decision};
pub use key::{CacheKey, ConnectionId};
pub use limiter::{QueryLimiter, QueryPermit};
pub use oracle::{LivenessOracle, PublishOracle, SessionRegistry, TopicExpiry};
pub use stats::CacheStats;
pub use store::{CacheEntry, CacheStore, Claim};
pub use watchdog::{TickReport, is_refresh_eligible};
