//! Authorization decision cache for an edge messaging gateway.
//!
//! The gateway asks [`auth::CachedAuthenticator::verify`] before admitting
//! every subscribe or publish. Grants are cached until they expire, refreshed
//! in the background shortly before expiry and dropped once the connection
//! stops using the topic.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod observability;

pub use auth::{
    AuthBackend, AuthOutcome, AuthorizationComponents, BackendDecision, CachedAuthenticator,
    ConnectionId, LivenessOracle,
};
pub use config::*;
pub use error::*;
