//! Prometheus metrics for the indexer.
//!
//! [`IndexerMetrics`] owns a dedicated [`Registry`]; every series is
//! labelled with the network name. The daemon's `/metrics` endpoint encodes
//! the registry with [`IndexerMetrics::encode_text`].

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_vec_with_registry, Encoder, HistogramOpts, HistogramVec, IntCounterVec,
    IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::engine::CycleReport;
use crate::IndexerError;

pub struct IndexerMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Cycles that ran to completion (including ones with per-id errors).
    pub cycles: IntCounterVec,
    /// Cycles that could not connect, plan, or lost their connection.
    pub cycle_errors: IntCounterVec,
    /// Referendum ids taken off the work queue.
    pub ids_processed: IntCounterVec,
    pub records_created: IntCounterVec,
    pub records_updated: IntCounterVec,
    /// Records that transitioned to (or were created as) `Cleared`.
    pub records_cleared: IntCounterVec,
    /// Per-id decode, query or store failures.
    pub id_errors: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Size of the most recent cycle's work set.
    pub work_set_size: IntGaugeVec,

    // ── Histograms ──────────────────────────────────────────────────────
    pub cycle_duration_seconds: HistogramVec,
}

impl IndexerMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Result<Self, IndexerError> {
        let registry = Registry::new();
        let labels = &["network"];

        let cycles = register_int_counter_vec_with_registry!(
            Opts::new("govmirror_cycles_total", "Reconciliation cycles completed"),
            labels,
            registry
        )?;
        let cycle_errors = register_int_counter_vec_with_registry!(
            Opts::new(
                "govmirror_cycle_errors_total",
                "Reconciliation cycles that failed or aborted"
            ),
            labels,
            registry
        )?;
        let ids_processed = register_int_counter_vec_with_registry!(
            Opts::new("govmirror_ids_processed_total", "Referendum ids processed by workers"),
            labels,
            registry
        )?;
        let records_created = register_int_counter_vec_with_registry!(
            Opts::new("govmirror_records_created_total", "Referendum records created"),
            labels,
            registry
        )?;
        let records_updated = register_int_counter_vec_with_registry!(
            Opts::new("govmirror_records_updated_total", "Referendum records updated"),
            labels,
            registry
        )?;
        let records_cleared = register_int_counter_vec_with_registry!(
            Opts::new("govmirror_records_cleared_total", "Referendum records marked Cleared"),
            labels,
            registry
        )?;
        let id_errors = register_int_counter_vec_with_registry!(
            Opts::new("govmirror_id_errors_total", "Per-referendum fetch, decode or store errors"),
            labels,
            registry
        )?;
        let work_set_size = register_int_gauge_vec_with_registry!(
            Opts::new("govmirror_work_set_size", "Ids planned in the most recent cycle"),
            labels,
            registry
        )?;
        // 50 ms → ~27 min.
        let cycle_duration_seconds = register_histogram_vec_with_registry!(
            HistogramOpts::new(
                "govmirror_cycle_duration_seconds",
                "Wall-clock duration of a reconciliation cycle"
            )
            .buckets(prometheus::exponential_buckets(0.05, 2.0, 16)?),
            labels,
            registry
        )?;

        Ok(Self {
            registry,
            cycles,
            cycle_errors,
            ids_processed,
            records_created,
            records_updated,
            records_cleared,
            id_errors,
            work_set_size,
            cycle_duration_seconds,
        })
    }

    /// Fold one cycle's report into the series of its network.
    pub fn observe_cycle(&self, report: &CycleReport) {
        let network = [report.network_name.as_str()];
        if report.aborted.is_some() {
            self.cycle_errors.with_label_values(&network).inc();
        } else {
            self.cycles.with_label_values(&network).inc();
        }
        self.ids_processed
            .with_label_values(&network)
            .inc_by(report.processed as u64);
        self.records_created
            .with_label_values(&network)
            .inc_by(report.created as u64);
        self.records_updated
            .with_label_values(&network)
            .inc_by(report.updated as u64);
        self.records_cleared
            .with_label_values(&network)
            .inc_by(report.cleared as u64);
        self.id_errors
            .with_label_values(&network)
            .inc_by(report.errors as u64);
        self.work_set_size
            .with_label_values(&network)
            .set(report.planned as i64);
        self.cycle_duration_seconds
            .with_label_values(&network)
            .observe(report.duration.as_secs_f64());
    }

    /// A cycle that failed before producing a report.
    pub fn observe_failed_cycle(&self, network_name: &str) {
        self.cycle_errors.with_label_values(&[network_name]).inc();
    }

    /// Prometheus text exposition of every registered series.
    pub fn encode_text(&self) -> Result<String, IndexerError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| IndexerError::Metrics(prometheus::Error::Msg(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govmirror_types::NetworkId;
    use std::time::Duration;

    fn report() -> CycleReport {
        CycleReport {
            network_id: NetworkId::new(0),
            network_name: "polkadot".into(),
            planned: 5,
            processed: 5,
            created: 2,
            updated: 1,
            cleared: 1,
            unchanged: 1,
            errors: 1,
            aborted: None,
            cancelled: false,
            duration: Duration::from_millis(120),
        }
    }

    #[test]
    fn observe_cycle_updates_labelled_series() {
        let metrics = IndexerMetrics::new().unwrap();
        metrics.observe_cycle(&report());
        metrics.observe_cycle(&report());

        assert_eq!(metrics.cycles.with_label_values(&["polkadot"]).get(), 2);
        assert_eq!(metrics.records_created.with_label_values(&["polkadot"]).get(), 4);
        assert_eq!(metrics.work_set_size.with_label_values(&["polkadot"]).get(), 5);
        assert_eq!(metrics.cycles.with_label_values(&["kusama"]).get(), 0);
    }

    #[test]
    fn aborted_cycle_counts_as_error() {
        let metrics = IndexerMetrics::new().unwrap();
        let mut aborted = report();
        aborted.aborted = Some("transport error: reset".into());
        metrics.observe_cycle(&aborted);
        metrics.observe_failed_cycle("polkadot");
        assert_eq!(metrics.cycle_errors.with_label_values(&["polkadot"]).get(), 2);
        assert_eq!(metrics.cycles.with_label_values(&["polkadot"]).get(), 0);
    }

    #[test]
    fn text_exposition_names_series() {
        let metrics = IndexerMetrics::new().unwrap();
        metrics.observe_cycle(&report());
        let text = metrics.encode_text().unwrap();
        assert!(text.contains("govmirror_cycles_total{network=\"polkadot\"} 1"));
        assert!(text.contains("govmirror_cycle_duration_seconds_bucket"));
    }
}
