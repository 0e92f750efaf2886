//! Metrics for the price parser and the statistics aggregator.
//!
//! Recording goes through the `metrics` facade. Without an installed recorder
//! every call is a no-op, so library users pay nothing unless they opt in.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::price::PriceStrategy;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Every metric name used in the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    PriceParsed,
    PriceInconsistencies,
    AggregateRuns,
    AggregateEvents,
    AggregateSkippedUndated,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::PriceParsed => "seoul_now_price_parsed_total",
            MetricName::PriceInconsistencies => "seoul_now_price_inconsistencies_total",
            MetricName::AggregateRuns => "seoul_now_aggregate_runs_total",
            MetricName::AggregateEvents => "seoul_now_aggregate_events",
            MetricName::AggregateSkippedUndated => "seoul_now_aggregate_undated_events_total",
        }
    }

    pub fn all() -> [MetricName; 5] {
        [
            MetricName::PriceParsed,
            MetricName::PriceInconsistencies,
            MetricName::AggregateRuns,
            MetricName::AggregateEvents,
            MetricName::AggregateSkippedUndated,
        ]
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct PriceMetrics;

impl PriceMetrics {
    /// Count which cascade step produced a parse result
    pub fn record_parsed(strategy: PriceStrategy) {
        ::metrics::counter!(MetricName::PriceParsed.as_str(), "strategy" => strategy.as_str())
            .increment(1);
    }

    pub fn record_inconsistencies(count: usize) {
        ::metrics::counter!(MetricName::PriceInconsistencies.as_str()).increment(count as u64);
    }
}

pub struct AggregateMetrics;

impl AggregateMetrics {
    pub fn record_run(events: usize, undated: usize) {
        ::metrics::counter!(MetricName::AggregateRuns.as_str()).increment(1);
        ::metrics::histogram!(MetricName::AggregateEvents.as_str()).record(events as f64);
        ::metrics::counter!(MetricName::AggregateSkippedUndated.as_str()).increment(undated as u64);
    }
}

/// Install an in-process Prometheus recorder. Idempotent.
///
/// No HTTP listener is started; callers render the exposition text with
/// [`render`] when they are done, which suits short-lived CLI runs.
pub fn install_recorder() -> Option<&'static PrometheusHandle> {
    if let Some(handle) = HANDLE.get() {
        return Some(handle);
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus recorder installed");
            ::metrics::describe_counter!(
                MetricName::PriceParsed.as_str(),
                "Price texts parsed, by cascade step"
            );
            ::metrics::describe_histogram!(
                MetricName::AggregateEvents.as_str(),
                "Events per aggregation run"
            );
            Some(HANDLE.get_or_init(|| handle))
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

/// Render the current metrics in Prometheus text format, if a recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(PrometheusHandle::render)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique_and_prefixed() {
        let names: HashSet<&str> = MetricName::all().iter().map(MetricName::as_str).collect();
        assert_eq!(names.len(), MetricName::all().len());
        assert!(names.iter().all(|n| n.starts_with("seoul_now_")));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        PriceMetrics::record_parsed(PriceStrategy::Generic);
        AggregateMetrics::record_run(10, 2);
    }
}
