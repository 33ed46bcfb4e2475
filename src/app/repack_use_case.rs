use tracing::{error, info};

use crate::app::validate_config_use_case::transfer_target;
use crate::config::{AppConfig, ConfigError};
use crate::pipeline::{PipelineOrchestrator, RunOutcome, RunRequest};

/// Tally of one batch over all configured guide entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Runs every configured entry in order. A failed entry is logged and the batch moves on.
pub struct RepackUseCase {
    orchestrator: PipelineOrchestrator,
}

impl RepackUseCase {
    pub fn new(orchestrator: PipelineOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// One request per `[[epg]]` entry. `force` overrides every entry's `ignore_hash`.
    pub fn build_requests(config: &AppConfig, force: bool) -> Result<Vec<RunRequest>, ConfigError> {
        config
            .epg
            .iter()
            .map(|item| -> Result<RunRequest, ConfigError> {
                let mut request = RunRequest::new(item.source.path.trim(), &item.channels, &item.result.path)
                    .forced(force || item.source.ignore_hash);

                if let Some(record) = item.source.hash_path.as_ref().filter(|p| !p.as_os_str().is_empty()) {
                    request = request.with_fingerprint_record(record);
                }
                if let Some(name) = item.result.ftp_name() {
                    request = request.with_transfer(transfer_target(config, name)?);
                }
                Ok(request)
            })
            .collect()
    }

    pub async fn run_all(&self, requests: &[RunRequest]) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, request) in requests.iter().enumerate() {
            info!("📋 Guide {}/{}: '{}'", index + 1, requests.len(), request.source);

            match self.orchestrator.run(request).await {
                Ok(RunOutcome::Skipped { .. }) => report.skipped += 1,
                Ok(RunOutcome::Completed(summary)) => {
                    info!(
                        "'{}' -> '{}' ({}, packed: {}, uploaded: {})",
                        request.source,
                        summary.result.display(),
                        summary.route.as_str(),
                        summary.packed,
                        summary.uploaded
                    );
                    report.completed += 1;
                }
                Err(e) => {
                    error!("❌ Guide '{}' failed: {}", request.source, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "📊 Batch finished: {} completed, {} skipped, {} failed",
            report.completed, report.skipped, report.failed
        );
        report
    }
}
