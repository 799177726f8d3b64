//! Serving counters and latency statistics for the loan approval pipeline.

use crate::types::decision::Decision;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collected while serving decisions
pub struct ServingMetrics {
    /// Applications received
    pub requests: AtomicU64,
    /// Applications that reached the classifier
    pub predictions: AtomicU64,
    /// Classifier approvals
    pub approvals: AtomicU64,
    /// Classifier rejections
    pub rejections: AtomicU64,
    /// Applications rejected by a business rule before prediction
    pub validation_failures: AtomicU64,
    /// Decision latencies (in microseconds)
    latencies: RwLock<Vec<u64>>,
    /// Approval probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl ServingMetrics {
    pub fn new() -> Self {
        Self {
            requests: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            approvals: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            validation_failures: AtomicU64::new(0),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a classifier decision
    pub fn record_prediction(&self, latency: Duration, decision: Decision, probability: f64) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.predictions.fetch_add(1, Ordering::Relaxed);
        match decision {
            Decision::Approved => self.approvals.fetch_add(1, Ordering::Relaxed),
            Decision::Rejected => self.rejections.fetch_add(1, Ordering::Relaxed),
        };

        self.record_latency(latency);

        let bucket = ((probability * 10.0).max(0.0) as usize).min(9);
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record an application rejected before prediction
    pub fn record_validation_failure(&self, latency: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency);
    }

    fn record_latency(&self, latency: Duration) {
        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only the most recent 10000
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Latency percentiles over the retained window
    pub fn get_latency_stats(&self) -> LatencyStats {
        let Ok(times) = self.latencies.read() else {
            return LatencyStats::default();
        };
        if times.is_empty() {
            return LatencyStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: sorted[count - 1],
        }
    }

    /// Approvals as a fraction of classifier decisions
    pub fn get_approval_rate(&self) -> f64 {
        let predictions = self.predictions.load(Ordering::Relaxed);
        if predictions == 0 {
            return 0.0;
        }
        self.approvals.load(Ordering::Relaxed) as f64 / predictions as f64
    }

    /// Requests per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|buckets| *buckets)
            .unwrap_or_default()
    }

    /// Log a summary of everything recorded so far
    pub fn print_summary(&self) {
        let requests = self.requests.load(Ordering::Relaxed);
        let predictions = self.predictions.load(Ordering::Relaxed);
        let approvals = self.approvals.load(Ordering::Relaxed);
        let rejections = self.rejections.load(Ordering::Relaxed);
        let validation_failures = self.validation_failures.load(Ordering::Relaxed);
        let latency = self.get_latency_stats();
        let distribution = self.get_probability_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             LOAN APPROVAL SERVICE - METRICS SUMMARY          ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Requests: {:>8}  │  Throughput: {:>6.1} req/s                 ║",
            requests,
            self.get_throughput()
        );
        info!(
            "║ Predictions: {:>6}  │  Approved: {:>6}  │  Rejected: {:>6}   ║",
            predictions, approvals, rejections
        );
        info!(
            "║ Validation rejections: {:>6}  │  Approval rate: {:>5.1}%      ║",
            validation_failures,
            self.get_approval_rate() * 100.0
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}        ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Approval Probability Distribution:                           ║");
        let total: u64 = distribution.iter().sum();
        for (i, &count) in distribution.iter().enumerate() {
            let pct = if total > 0 {
                (count as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ServingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Decision latency statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints a metrics summary at a fixed interval
pub struct MetricsReporter {
    metrics: Arc<ServingMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<ServingMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // First tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ServingMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), Decision::Approved, 0.8);
        metrics.record_prediction(Duration::from_micros(300), Decision::Rejected, 0.2);
        metrics.record_validation_failure(Duration::from_micros(5));

        assert_eq!(metrics.requests.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.predictions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.approvals.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.rejections.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.validation_failures.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.get_approval_rate(), 0.5);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ServingMetrics::new();
        assert_eq!(metrics.get_latency_stats(), LatencyStats::default());

        for us in [10, 20, 30, 40] {
            metrics.record_prediction(Duration::from_micros(us), Decision::Approved, 1.0);
        }

        let stats = metrics.get_latency_stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.mean_us, 25);
        assert_eq!(stats.p50_us, 30);
        assert_eq!(stats.max_us, 40);
    }

    #[test]
    fn test_probability_buckets() {
        let metrics = ServingMetrics::new();
        metrics.record_prediction(Duration::ZERO, Decision::Approved, 1.0);
        metrics.record_prediction(Duration::ZERO, Decision::Rejected, 0.0);
        metrics.record_prediction(Duration::ZERO, Decision::Rejected, 0.35);

        let distribution = metrics.get_probability_distribution();
        assert_eq!(distribution[9], 1);
        assert_eq!(distribution[0], 1);
        assert_eq!(distribution[3], 1);
    }
}
