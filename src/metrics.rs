//! Metrics collection and export module

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Queue counters
    pub tx_enqueued: IntCounter,
    pub tx_completed: IntCounter,
    pub tx_failed: IntCounter,
    pub tx_errored: IntCounter,

    // Nonce counters
    pub nonce_resyncs: IntCounter,
    pub nonce_invalidations: IntCounter,

    // Auto-loop counters
    pub runs_skipped_busy: IntCounter,
    pub runs_cancelled: IntCounter,

    // Gauges
    pub queued_entries: IntGauge,
    pub active_runs: IntGauge,

    // Histograms
    pub confirmation_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tx_enqueued = IntCounter::with_opts(Opts::new(
            "tx_enqueued_total",
            "Transactions handed to a wallet queue",
        ))?;

        let tx_completed = IntCounter::with_opts(Opts::new(
            "tx_completed_total",
            "Transactions mined with success status",
        ))?;

        let tx_failed = IntCounter::with_opts(Opts::new(
            "tx_failed_total",
            "Transactions mined with failure status",
        ))?;

        let tx_errored = IntCounter::with_opts(Opts::new(
            "tx_errored_total",
            "Transactions that errored during construction, submission or wait",
        ))?;

        let nonce_resyncs = IntCounter::with_opts(Opts::new(
            "nonce_resyncs_total",
            "Nonce cache refreshes from the network pending count",
        ))?;

        let nonce_invalidations = IntCounter::with_opts(Opts::new(
            "nonce_invalidations_total",
            "Nonce cache entries reset after a failed transaction",
        ))?;

        let runs_skipped_busy = IntCounter::with_opts(Opts::new(
            "runs_skipped_busy_total",
            "Wallet runs skipped because another run was active",
        ))?;

        let runs_cancelled = IntCounter::with_opts(Opts::new(
            "runs_cancelled_total",
            "Auto-action runs stopped early by a stop request",
        ))?;

        let queued_entries = IntGauge::with_opts(Opts::new(
            "queued_entries",
            "Entries currently visible on the queue board",
        ))?;

        let active_runs = IntGauge::with_opts(Opts::new(
            "active_runs",
            "Auto or manual runs currently in progress",
        ))?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to receipt",
            )
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(tx_enqueued.clone()))?;
        registry.register(Box::new(tx_completed.clone()))?;
        registry.register(Box::new(tx_failed.clone()))?;
        registry.register(Box::new(tx_errored.clone()))?;
        registry.register(Box::new(nonce_resyncs.clone()))?;
        registry.register(Box::new(nonce_invalidations.clone()))?;
        registry.register(Box::new(runs_skipped_busy.clone()))?;
        registry.register(Box::new(runs_cancelled.clone()))?;
        registry.register(Box::new(queued_entries.clone()))?;
        registry.register(Box::new(active_runs.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            tx_enqueued,
            tx_completed,
            tx_failed,
            tx_errored,
            nonce_resyncs,
            nonce_invalidations,
            runs_skipped_busy,
            runs_cancelled,
            queued_entries,
            active_runs,
            confirmation_latency,
            rpc_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode_text(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_exports_text() {
        let m = Metrics::new().unwrap();
        m.tx_enqueued.inc();
        m.queued_entries.set(3);

        let text = m.encode_text().unwrap();
        assert!(text.contains("tx_enqueued_total 1"));
        assert!(text.contains("queued_entries 3"));
    }

    #[test]
    fn test_timer_observes_histogram() {
        let m = Metrics::new().unwrap();
        let timer = Timer::new();
        timer.observe_duration(&m.confirmation_latency);
        assert_eq!(m.confirmation_latency.get_sample_count(), 1);
    }
}
