pub mod subscriber;

pub use subscriber::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;

    #[test]
    fn test_unsupported_format_rejected() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: "xml".to_string(),
        };

        let result = init_logging(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unsupported log format"));
    }

    #[test]
    fn test_second_initialization_is_an_error() {
        let config = LoggingConfig::default();

        // Another test may already have installed a subscriber; either way the
        // second call in this test must fail rather than panic.
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
