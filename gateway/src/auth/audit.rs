use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::decision::AuthOutcome;
use super::key::ConnectionId;

/// Where a delivered decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    Cache,
    Backend,
    Closed,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionSource::Cache => "cache",
            DecisionSource::Backend => "backend",
            DecisionSource::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub connection: ConnectionId,
    pub topic: String,
    pub allowed: bool,
    pub ttl_millis: Option<u64>,
    pub source: DecisionSource,
}

impl AuditEntry {
    pub fn new(
        connection: &ConnectionId,
        topic: &str,
        outcome: &AuthOutcome,
        source: DecisionSource,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            connection: *connection,
            topic: topic.to_string(),
            allowed: outcome.is_allowed(),
            ttl_millis: outcome.ttl_millis(),
            source,
        }
    }
}

pub fn audit_decision(
    connection: &ConnectionId,
    topic: &str,
    outcome: &AuthOutcome,
    source: DecisionSource,
) -> AuditEntry {
    let entry = AuditEntry::new(connection, topic, outcome, source);

    info!(
        target: "audit",
        audit_type = "topic_authorization",
        timestamp = %entry.timestamp.to_rfc3339(),
        connection = %entry.connection,
        topic = %entry.topic,
        allowed = entry.allowed,
        ttl_millis = ?entry.ttl_millis,
        source = entry.source.as_str(),
        "Authorization decision"
    );

    entry
}
