//! Run metrics for the repacker.
//!
//! Recorded through the `metrics` facade. Nothing is exported unless a recorder is
//! installed; for a one-shot process the rendered snapshot is written to a textfile
//! that a node exporter can pick up.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;
use tracing::{info, warn};

use crate::error::Stage;
use crate::parser::FilterStats;

pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to install metrics recorder: {}", e);
            None
        }
    }
}

pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> bool {
    match std::fs::write(path, handle.render()) {
        Ok(()) => {
            info!("Metrics written to '{}'", path.display());
            true
        }
        Err(e) => {
            warn!("Failed to write metrics to '{}': {}", path.display(), e);
            false
        }
    }
}

pub fn record_run(outcome: &'static str) {
    counter!("epg_repacker_runs_total", "outcome" => outcome).increment(1);
}

pub fn record_stage(stage: Stage, duration_secs: f64) {
    histogram!("epg_repacker_stage_duration_seconds", "stage" => stage.as_str()).record(duration_secs);
}

pub fn record_filter(stats: &FilterStats) {
    counter!("epg_repacker_elements_kept_total", "kind" => "channel").increment(stats.channels_kept as u64);
    counter!("epg_repacker_elements_kept_total", "kind" => "programme")
        .increment(stats.programmes_kept as u64);
    counter!("epg_repacker_elements_dropped_total").increment(stats.dropped as u64);
    counter!("epg_repacker_anomalies_total").increment(stats.anomalies as u64);
}
