use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::app::ports::{Fetcher, Packer, TransferConnector, TransferGateway, WhitelistSource};
use crate::error::{RepackError, Result, Stage};
use crate::fingerprint::FingerprintGate;
use crate::metrics;
use crate::parser::{FilterStats, SourceEncoding, XmlFilter};
use crate::paths::{is_http_url, try_delete_dir, try_delete_file};
use crate::pipeline::run_request::RunRequest;
use crate::pipeline::state::{OutputRoute, PipelineState};

/// What a finished run did
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The source fingerprint matched the saved one; nothing was produced.
    Skipped { source: String },
    Completed(RunSummary),
}

impl RunOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RunOutcome::Skipped { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub route: OutputRoute,
    pub result: PathBuf,
    pub stats: FilterStats,
    pub packed: bool,
    pub uploaded: bool,
    pub fingerprint_saved: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// Drives one guide entry through acquire, gate, filter, pack, transfer, persist and
/// cleanup. Collaborators are injected once per process; everything run-scoped lives
/// in a fresh `PipelineState`.
pub struct PipelineOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    connector: Arc<dyn TransferConnector>,
    packer: Arc<dyn Packer>,
    whitelist_source: Arc<dyn WhitelistSource>,
    work_dir: PathBuf,
    delete_work_dir: bool,
}

impl PipelineOrchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        connector: Arc<dyn TransferConnector>,
        packer: Arc<dyn Packer>,
        whitelist_source: Arc<dyn WhitelistSource>,
        work_dir: PathBuf,
        delete_work_dir: bool,
    ) -> Self {
        Self {
            fetcher,
            connector,
            packer,
            whitelist_source,
            work_dir,
            delete_work_dir,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run one request to completion. Temporary files are removed on every exit path.
    #[instrument(skip(self, request), fields(source = %request.source))]
    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        request.validate()?;

        let started_at = Utc::now();
        let mut state = PipelineState::new(request, &self.work_dir);
        info!("🚀 Starting run, route: {}", state.route().as_str());

        // lazy: nothing connects until the transfer stage uses it
        let gateway = request.transfer.as_ref().map(|target| self.connector.open(target));

        let outcome = self
            .execute(request, &mut state, gateway.as_deref(), started_at)
            .await;

        if let Some(gateway) = &gateway {
            gateway.close().await;
        }
        self.cleanup(&state);

        match &outcome {
            Ok(RunOutcome::Skipped { .. }) => metrics::record_run("skipped"),
            Ok(RunOutcome::Completed(_)) => metrics::record_run("completed"),
            Err(e) => {
                warn!("💥 Run failed during {}: {}", e.stage().map_or("validation", |s| s.as_str()), e);
                metrics::record_run("failed");
            }
        }

        outcome
    }

    async fn execute(
        &self,
        request: &RunRequest,
        state: &mut PipelineState,
        gateway: Option<&dyn TransferGateway>,
        started_at: DateTime<Utc>,
    ) -> Result<RunOutcome> {
        let source = self.acquire(request, state).await?;

        let gate = FingerprintGate::new(request.fingerprint_record.clone());
        if !request.force && gate.matches_saved(&source) {
            info!("⏭️ Processing of '{}' skipped, its fingerprint is known", request.source);
            return Ok(RunOutcome::Skipped {
                source: request.source.clone(),
            });
        }

        let (parsed, stats) = self.filter(request, state, &source)?;

        let packed = state.route().needs_packing();
        if packed {
            self.pack(state, &parsed)?;
        }

        // a gateway exists exactly when the request carries a transfer target
        let uploaded = match gateway {
            Some(gateway) => {
                let artifact = state.upload_artifact().unwrap_or(&parsed).to_path_buf();
                self.transfer(request, gateway, &artifact).await?;
                true
            }
            None => false,
        };

        let fingerprint_saved = gate.save(&source);
        if gate.is_enabled() && !fingerprint_saved {
            warn!("Fingerprint of '{}' was not saved, next run will reprocess it", request.source);
        }

        let summary = RunSummary {
            route: state.route(),
            result: request.result.clone(),
            stats,
            packed,
            uploaded,
            fingerprint_saved,
            started_at,
            completed_at: Utc::now(),
        };
        info!(
            "✅ Run finished in {}ms: {} channels, {} programmes kept, {} dropped",
            summary.duration().num_milliseconds(),
            stats.channels_kept,
            stats.programmes_kept,
            stats.dropped
        );

        Ok(RunOutcome::Completed(summary))
    }

    async fn acquire(&self, request: &RunRequest, state: &mut PipelineState) -> Result<PathBuf> {
        if !is_http_url(&request.source) {
            let source = PathBuf::from(&request.source);
            state.set_source(source.clone(), false);
            return Ok(source);
        }

        let timer = Instant::now();
        let downloaded = self
            .fetcher
            .fetch(&request.source)
            .await
            .map_err(|source| RepackError::Fetch {
                url: request.source.clone(),
                source,
            })?;
        metrics::record_stage(Stage::Acquire, timer.elapsed().as_secs_f64());

        info!("📡 Downloaded '{}' to '{}'", request.source, downloaded.display());
        state.set_source(downloaded.clone(), true);
        Ok(downloaded)
    }

    fn filter(
        &self,
        request: &RunRequest,
        state: &mut PipelineState,
        source: &Path,
    ) -> Result<(PathBuf, FilterStats)> {
        let timer = Instant::now();

        let whitelist = self
            .whitelist_source
            .load(&request.channels)
            .map_err(|source| RepackError::Whitelist {
                path: request.channels.clone(),
                source,
            })?;
        if whitelist.is_empty() {
            warn!("Whitelist '{}' is empty, nothing will be kept", request.channels.display());
        }

        if state.parsed_is_temporary() {
            fs::create_dir_all(state.work_dir()).map_err(|source| RepackError::Io {
                stage: Stage::Filter,
                path: state.work_dir().to_path_buf(),
                source,
            })?;
        }

        let destination = state.resolve_parsed();
        let encoding = request
            .source_encoding
            .unwrap_or_else(|| SourceEncoding::from_path(source));

        info!("🔧 Processing '{}' ({:?})", source.display(), encoding);
        let stats = match XmlFilter::new(whitelist).filter_file(source, encoding, &destination) {
            Ok(stats) => stats,
            Err(e) => {
                // a half-written final result must not pass for a good one
                if !state.parsed_is_temporary() {
                    try_delete_file(&destination);
                }
                return Err(RepackError::Parse {
                    path: source.to_path_buf(),
                    source: e,
                });
            }
        };

        metrics::record_filter(&stats);
        metrics::record_stage(Stage::Filter, timer.elapsed().as_secs_f64());
        if stats.anomalies > 0 {
            warn!("{} unexpected nodes skipped in '{}'", stats.anomalies, source.display());
        }
        info!("💾 Filtered result saved to '{}'", destination.display());

        Ok((destination, stats))
    }

    fn pack(&self, state: &mut PipelineState, parsed: &Path) -> Result<PathBuf> {
        let timer = Instant::now();
        let destination = state.resolve_packed();

        self.packer
            .pack(parsed, &destination)
            .map_err(|source| RepackError::Pack {
                source_path: parsed.to_path_buf(),
                dest: destination.clone(),
                source,
            })?;

        metrics::record_stage(Stage::Pack, timer.elapsed().as_secs_f64());
        info!("📦 '{}' packed to '{}'", parsed.display(), destination.display());
        Ok(destination)
    }

    async fn transfer(
        &self,
        request: &RunRequest,
        gateway: &dyn TransferGateway,
        artifact: &Path,
    ) -> Result<()> {
        let timer = Instant::now();
        let remote = request.remote_result();

        gateway
            .upload(artifact, &remote)
            .await
            .map_err(|source| RepackError::Transfer {
                local: artifact.to_path_buf(),
                remote: remote.clone(),
                source,
            })?;

        metrics::record_stage(Stage::Transfer, timer.elapsed().as_secs_f64());
        info!("📤 '{}' uploaded to '{}'", artifact.display(), remote);
        Ok(())
    }

    fn cleanup(&self, state: &PipelineState) {
        for artifact in state.temporary_artifacts() {
            try_delete_file(artifact);
        }

        if self.delete_work_dir && state.work_dir().is_dir() && try_delete_dir(state.work_dir(), false) {
            debug!("Deleted temp folder '{}'", state.work_dir().display());
        }
    }
}
