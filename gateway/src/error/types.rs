use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Sources that cannot be read or parsed are `Config`; values that parse but
/// do not fit the field they target are `InvalidConfiguration`.
impl From<figment::Error> for GatewayError {
    fn from(err: figment::Error) -> Self {
        use figment::error::Kind;

        match err.kind {
            Kind::InvalidType(..)
            | Kind::InvalidValue(..)
            | Kind::InvalidLength(..)
            | Kind::UnknownVariant(..)
            | Kind::ISizeOutOfRange(..)
            | Kind::USizeOutOfRange(..) => GatewayError::InvalidConfiguration(err.to_string()),
            _ => GatewayError::Config(err.to_string()),
        }
    }
}

impl From<garde::Report> for GatewayError {
    fn from(report: garde::Report) -> Self {
        GatewayError::InvalidConfiguration(report.to_string())
    }
}

/// Transient failure talking to a decision backend.
///
/// Distinct from an explicit denial: a backend that answers "no" returns
/// `Ok(BackendDecision::Denied { .. })`, never one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend query timed out after {0}ms")]
    Timeout(u64),
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError::Unavailable(s.to_string())
    }
}

/// Why a topic was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("authorizer is closed")]
    Closed,
}

/// Denial delivered to the caller of `verify`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Access to topic '{topic}' denied, {reason}")]
pub struct TopicAccessError {
    pub topic: String,
    pub reason: DenialReason,
}

impl TopicAccessError {
    pub fn forbidden(topic: &str, reason: impl Into<String>) -> Self {
        Self {
            topic: topic.to_string(),
            reason: DenialReason::Forbidden(reason.into()),
        }
    }

    pub fn backend_unavailable(topic: &str, err: &BackendError) -> Self {
        Self {
            topic: topic.to_string(),
            reason: DenialReason::BackendUnavailable(err.to_string()),
        }
    }

    pub fn closed(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            reason: DenialReason::Closed,
        }
    }
}
