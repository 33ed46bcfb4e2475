use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use epg_repacker::app::{RepackUseCase, ValidateConfigUseCase};
use epg_repacker::config::AppConfig;
use epg_repacker::constants::DEFAULT_CONFIG_PATH;
use epg_repacker::infra::{FileWhitelistSource, FtpConnector, GzipPacker, HttpFetcher};
use epg_repacker::pipeline::PipelineOrchestrator;
use epg_repacker::{logging, metrics};

#[derive(Parser)]
#[command(name = "epg_repacker")]
#[command(about = "Filters XMLTV guides down to a channel whitelist, then packs and uploads them")]
#[command(version)]
struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(long, env = "EPG_REPACKER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Environment name; merges appsettings.<env>.<ext> over the base file
    #[arg(long, env = "EPG_REPACKER_ENV")]
    env: Option<String>,

    /// Process every guide even when its fingerprint is unchanged
    #[arg(long)]
    force: bool,

    /// Skip URL and FTP probes during validation
    #[arg(long)]
    skip_remote_checks: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config, cli.env.as_deref())
        .with_context(|| format!("loading configuration from '{}'", cli.config.display()))?;

    let _guard = logging::init_logging(&config.logging);
    let recorder = config
        .metrics
        .textfile
        .as_ref()
        .and_then(|_| metrics::install_recorder());

    info!("🚀 epg_repacker {} starting", env!("CARGO_PKG_VERSION"));

    let work_dir = config.temp_dir.resolved_path();
    let fetcher = Arc::new(HttpFetcher::new(&work_dir, config.web.user_agent.as_deref())?);
    let connector = Arc::new(FtpConnector);

    let validator = ValidateConfigUseCase::new(fetcher.clone(), connector.clone(), cli.skip_remote_checks);
    if let Err(e) = validator.ensure_valid(&config).await {
        error!("❌ Configuration is invalid: {}", e);
        return Ok(ExitCode::FAILURE);
    }

    let requests = RepackUseCase::build_requests(&config, cli.force)?;
    let orchestrator = PipelineOrchestrator::new(
        fetcher,
        connector,
        Arc::new(GzipPacker::new(config.archiving.gzip_compression)),
        Arc::new(FileWhitelistSource::new(config.channels.whitelist_options())),
        work_dir,
        config.temp_dir.delete,
    );
    let report = RepackUseCase::new(orchestrator).run_all(&requests).await;

    if let (Some(handle), Some(path)) = (recorder.as_ref(), config.metrics.textfile.as_ref()) {
        metrics::write_textfile(handle, path);
    }

    Ok(if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
