use crate::scratch::ScratchStats;
use crate::visit::VisitSummary;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency and traversal counters gathered by the harness
pub struct Metrics {
    operation_latencies: Mutex<BTreeMap<String, Histogram<u64>>>,
    operations: AtomicU64,
    visited: AtomicU64,
    jobs: AtomicU64,
    merges: AtomicU64,
    merges_skipped: AtomicU64,
    stops: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            operation_latencies: Mutex::new(BTreeMap::new()),
            operations: AtomicU64::new(0),
            visited: AtomicU64::new(0),
            jobs: AtomicU64::new(0),
            merges: AtomicU64::new(0),
            merges_skipped: AtomicU64::new(0),
            stops: AtomicU64::new(0),
        }
    }

    pub fn record_latency(&self, operation: &str, duration: Duration) {
        let mut latencies = self.operation_latencies.lock();
        if !latencies.contains_key(operation) {
            match Histogram::<u64>::new(3) {
                Ok(histogram) => {
                    latencies.insert(operation.to_string(), histogram);
                }
                Err(e) => {
                    tracing::warn!(operation, error = %e, "cannot create latency histogram");
                    return;
                }
            }
        }

        if let Some(histogram) = latencies.get_mut(operation) {
            let micros = duration.as_micros() as u64;
            let _ = histogram.record(micros);
            self.operations.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Adds the counters of one finished visit.
    pub fn record_summary(&self, summary: &VisitSummary) {
        self.visited
            .fetch_add(summary.visited as u64, Ordering::Relaxed);
        self.jobs.fetch_add(summary.jobs as u64, Ordering::Relaxed);
        self.merges.fetch_add(summary.merges as u64, Ordering::Relaxed);
        self.merges_skipped
            .fetch_add(summary.merges_skipped as u64, Ordering::Relaxed);
        if summary.stopped {
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// (p50, p95, p99) in microseconds, zeros for an unknown operation.
    pub fn get_percentiles(&self, operation: &str) -> (f64, f64, f64) {
        let latencies = self.operation_latencies.lock();
        latencies.get(operation).map_or((0.0, 0.0, 0.0), percentiles)
    }

    pub fn get_operations(&self) -> u64 {
        self.operations.load(Ordering::Relaxed)
    }

    pub fn report(&self, scratch: Option<ScratchStats>) -> MetricsReport {
        let latencies = self.operation_latencies.lock();
        let operation_latencies = latencies
            .iter()
            .map(|(op, histogram)| {
                let (p50, p95, p99) = percentiles(histogram);
                let report = LatencyReport {
                    samples: histogram.len(),
                    p50,
                    p95,
                    p99,
                    max: histogram.max() as f64,
                };
                (op.clone(), report)
            })
            .collect();

        MetricsReport {
            operations: self.operations.load(Ordering::Relaxed),
            visited: self.visited.load(Ordering::Relaxed),
            jobs: self.jobs.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            merges_skipped: self.merges_skipped.load(Ordering::Relaxed),
            stops: self.stops.load(Ordering::Relaxed),
            scratch,
            operation_latencies,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn percentiles(histogram: &Histogram<u64>) -> (f64, f64, f64) {
    (
        histogram.value_at_quantile(0.50) as f64,
        histogram.value_at_quantile(0.95) as f64,
        histogram.value_at_quantile(0.99) as f64,
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct LatencyReport {
    pub samples: u64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub operations: u64,
    pub visited: u64,
    pub jobs: u64,
    pub merges: u64,
    pub merges_skipped: u64,
    pub stops: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch: Option<ScratchStats>,
    pub operation_latencies: BTreeMap<String, LatencyReport>, // microseconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.get_operations(), 0);
    }

    #[test]
    fn test_latency_recording() {
        let metrics = Metrics::new();

        metrics.record_latency("insert", Duration::from_micros(100));
        metrics.record_latency("insert", Duration::from_micros(200));
        metrics.record_latency("insert", Duration::from_micros(150));

        let (p50, p95, p99) = metrics.get_percentiles("insert");
        assert!(p50 > 0.0);
        assert!(p50 <= p95);
        assert!(p95 <= p99);
        assert_eq!(metrics.get_operations(), 3);
    }

    #[test]
    fn test_percentile_calculation() {
        let metrics = Metrics::new();
        for i in 1..=100 {
            metrics.record_latency("visit", Duration::from_micros(i * 10));
        }

        let (p50, p95, p99) = metrics.get_percentiles("visit");
        assert!((400.0..=600.0).contains(&p50), "p50 = {}", p50);
        assert!((900.0..=1000.0).contains(&p95), "p95 = {}", p95);
        assert!((980.0..=1010.0).contains(&p99), "p99 = {}", p99);
    }

    #[test]
    fn test_get_percentiles_nonexistent_operation() {
        let metrics = Metrics::new();
        assert_eq!(metrics.get_percentiles("nonexistent"), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_record_summary() {
        let metrics = Metrics::new();
        let summary = VisitSummary {
            visited: 10,
            jobs: 4,
            merges: 4,
            stopped: true,
            ..VisitSummary::default()
        };
        metrics.record_summary(&summary);
        metrics.record_summary(&VisitSummary {
            merges_skipped: 1,
            ..VisitSummary::default()
        });

        let report = metrics.report(None);
        assert_eq!(report.visited, 10);
        assert_eq!(report.jobs, 4);
        assert_eq!(report.merges, 4);
        assert_eq!(report.merges_skipped, 1);
        assert_eq!(report.stops, 1);
    }

    #[test]
    fn test_report_serializes() {
        let metrics = Metrics::new();
        metrics.record_latency("range", Duration::from_micros(42));
        let report = metrics.report(Some(ScratchStats::default()));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["operation_latencies"]["range"]["samples"], 1);
        assert!(json.get("scratch").is_some());
    }
}
