//! Decision backend abstraction
//!
//! The cache never decides anything itself. Every decision originates from an
//! [`AuthBackend`], which may be slow or temporarily unreachable.

use async_trait::async_trait;
use std::sync::Arc;

use super::decision::BackendDecision;
use super::key::ConnectionId;
use super::oracle::LivenessOracle;
use crate::error::BackendError;

/// Source of authorization decisions.
///
/// # Contract
///
/// - `Ok(BackendDecision::Allow { ttl_millis })` grants access; a TTL of zero
///   means the grant never expires.
/// - `Ok(BackendDecision::Denied { .. })` refuses access.
/// - `Err(_)` is a transient failure and says nothing about the grant.
///
/// Implementations must be safe to call concurrently for different keys.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use edge_gateway::auth::{AuthBackend, BackendDecision, ConnectionId};
/// use edge_gateway::error::BackendError;
///
/// struct ReadOnlyTopics;
///
/// #[async_trait]
/// impl AuthBackend for ReadOnlyTopics {
///     async fn verify(
///         &self,
///         _connection: &ConnectionId,
///         topic: &str,
///     ) -> Result<BackendDecision, BackendError> {
///         if topic.starts_with("public/") {
///             Ok(BackendDecision::allow_indefinite())
///         } else {
///             Ok(BackendDecision::denied("not public"))
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn verify(
        &self,
        connection: &ConnectionId,
        topic: &str,
    ) -> Result<BackendDecision, BackendError>;

    /// Called once when the owning cache is attached to its oracle.
    async fn attach(&self, _oracle: Arc<dyn LivenessOracle>) {}

    /// Called once when the owning cache is closed.
    async fn close(&self) {}
}

