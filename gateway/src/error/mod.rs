pub mod types;

pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;
    use garde::Validate;

    #[test]
    fn test_error_display_messages() {
        let err = GatewayError::Config("missing file".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing file");

        let err = GatewayError::InvalidConfiguration("max_pending_queries".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: max_pending_queries");
    }

    #[test]
    fn test_garde_report_maps_to_invalid_configuration() {
        let config = crate::config::CacheConfig::default().with_max_pending_queries(0);
        let report = config.validate().unwrap_err();

        let err = GatewayError::from(report);
        assert!(matches!(err, GatewayError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("max_pending_queries"));
    }

    #[test]
    fn test_backend_error_display() {
        assert_eq!(
            BackendError::Unavailable("connection refused".to_string()).to_string(),
            "Backend unavailable: connection refused"
        );
        assert_eq!(
            BackendError::Timeout(250).to_string(),
            "Backend query timed out after 250ms"
        );
        assert_eq!(
            BackendError::from("reset by peer"),
            BackendError::Unavailable("reset by peer".to_string())
        );
    }

    #[test]
    fn test_topic_access_error_variants() {
        let err = TopicAccessError::forbidden("quotes/eur", "no entitlement");
        assert_eq!(err.topic, "quotes/eur");
        assert_eq!(err.reason, DenialReason::Forbidden("no entitlement".to_string()));
        assert_eq!(
            err.to_string(),
            "Access to topic 'quotes/eur' denied, forbidden: no entitlement"
        );

        let err = TopicAccessError::backend_unavailable("quotes/eur", &BackendError::Timeout(10));
        assert!(matches!(err.reason, DenialReason::BackendUnavailable(_)));
        assert!(err.to_string().contains("timed out"));

        let err = TopicAccessError::closed("quotes/eur");
        assert_eq!(err.reason, DenialReason::Closed);
    }
}
