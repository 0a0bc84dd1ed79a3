//! Decision cache metrics
//!
//! Recorded through the `metrics` facade. Labels are drawn from small fixed
//! sets; connection ids and topic names never appear as labels.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Why a backend query was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Foreground query on a cache miss.
    Miss,
    /// Background refresh by the watchdog.
    Refresh,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Miss => "miss",
            QueryKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResultLabel {
    Allow,
    Deny,
    Error,
}

impl QueryResultLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryResultLabel::Allow => "allow",
            QueryResultLabel::Deny => "deny",
            QueryResultLabel::Error => "error",
        }
    }
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("auth_cache_lookup_total", "result" => result).increment(1);
}

pub fn record_backend_query(kind: QueryKind, result: QueryResultLabel, duration: Duration) {
    counter!(
        "auth_backend_query_total",
        "kind" => kind.as_str(),
        "result" => result.as_str()
    )
    .increment(1);

    histogram!(
        "auth_backend_query_duration_seconds",
        "kind" => kind.as_str()
    )
    .record(duration.as_secs_f64());

    tracing::debug!(
        kind = kind.as_str(),
        result = result.as_str(),
        duration_ms = %duration.as_millis(),
        "Backend query metrics recorded"
    );
}

pub fn record_purge() {
    counter!("auth_cache_purge_total").increment(1);
}

/// `reason` is one of `limiter_full` or `in_flight`.
pub fn record_refresh_skipped(reason: &'static str) {
    counter!("auth_cache_refresh_skipped_total", "reason" => reason).increment(1);
}

pub fn set_pending_refreshes(pending: usize) {
    gauge!("auth_cache_pending_refreshes").set(pending as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn render_with_local_recorder(record: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, record);
        handle.render()
    }

    #[test]
    fn test_lookup_metrics() {
        let output = render_with_local_recorder(|| {
            record_cache_lookup(true);
            record_cache_lookup(true);
            record_cache_lookup(false);
        });

        assert!(output.contains("auth_cache_lookup_total{result=\"hit\"} 2"));
        assert!(output.contains("auth_cache_lookup_total{result=\"miss\"} 1"));
    }

    #[test]
    fn test_backend_query_metrics() {
        let output = render_with_local_recorder(|| {
            record_backend_query(
                QueryKind::Refresh,
                QueryResultLabel::Deny,
                Duration::from_millis(20),
            );
        });

        assert!(output.contains("auth_backend_query_total"));
        assert!(output.contains("kind=\"refresh\""));
        assert!(output.contains("result=\"deny\""));
        assert!(output.contains("auth_backend_query_duration_seconds"));
    }

    #[test]
    fn test_watchdog_metrics() {
        let output = render_with_local_recorder(|| {
            record_purge();
            record_refresh_skipped("limiter_full");
            set_pending_refreshes(3);
        });

        assert!(output.contains("auth_cache_purge_total 1"));
        assert!(output.contains("auth_cache_refresh_skipped_total{reason=\"limiter_full\"} 1"));
        assert!(output.contains("auth_cache_pending_refreshes"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cache_lookup(true);
        record_purge();
        set_pending_refreshes(0);
    }

    #[test]
    fn test_labels() {
        assert_eq!(QueryKind::Miss.as_str(), "miss");
        assert_eq!(QueryKind::Refresh.as_str(), "refresh");
        assert_eq!(QueryResultLabel::Allow.as_str(), "allow");
        assert_eq!(QueryResultLabel::Error.as_str(), "error");
    }
}
