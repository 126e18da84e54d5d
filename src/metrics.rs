// src/metrics.rs
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up in the exposition even
/// before the first increment).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "triage_gate_rejected_total",
            "Articles culled by the ingestion gate, labelled by reason."
        );
        describe_counter!(
            "triage_classified_total",
            "Articles with at least one matched category."
        );
        describe_counter!(
            "triage_uncategorized_total",
            "Articles that matched no category."
        );
        describe_counter!(
            "triage_duplicates_total",
            "Articles folded into an earlier canonical article."
        );
        describe_counter!("triage_admitted_total", "Articles admitted at full score.");
        describe_counter!(
            "triage_downranked_total",
            "Articles admitted with a burst penalty."
        );
        describe_counter!(
            "triage_suppressed_total",
            "Articles dropped by the burst controller."
        );
        describe_counter!(
            "triage_sweep_purged_total",
            "Fingerprint entries removed by retention sweeps."
        );
        describe_counter!(
            "triage_sink_errors_total",
            "Decision deliveries that failed, labelled by sink."
        );
        describe_gauge!(
            "triage_fingerprint_entries",
            "Fingerprint entries currently indexed."
        );
        describe_gauge!(
            "triage_clusters_active",
            "Story clusters currently tracked by the burst controller."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder. Call once at startup, before any
    /// pipeline work; the handle renders the exposition text on demand.
    pub fn init() -> Self {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");
        ensure_metrics_described();
        Self { handle }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
