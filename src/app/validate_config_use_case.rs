use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::app::ports::{Fetcher, TransferConnector, TransferTarget};
use crate::config::{AppConfig, ConfigError, EpgItemConfig};
use crate::paths::{
    is_file_readable_and_not_empty, is_file_writable, is_http_url, is_unsupported_archive,
    pick_random_file_path, try_create_dir, try_delete_dir, try_delete_file,
};

/// Checks a loaded configuration before any run starts.
///
/// The first failed check is returned; nothing is processed after it. Remote checks
/// (URL probes and FTP permission probes) can be switched off for offline use.
pub struct ValidateConfigUseCase {
    fetcher: Arc<dyn Fetcher>,
    connector: Arc<dyn TransferConnector>,
    skip_remote_checks: bool,
}

impl ValidateConfigUseCase {
    pub fn new(fetcher: Arc<dyn Fetcher>, connector: Arc<dyn TransferConnector>, skip_remote_checks: bool) -> Self {
        Self {
            fetcher,
            connector,
            skip_remote_checks,
        }
    }

    pub async fn ensure_valid(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let temp_dir = config.temp_dir.resolved_path();
        ensure_temp_dir(&temp_dir, config.temp_dir.delete)?;
        ensure_unique_ftp_names(config)?;
        ensure_epg_entries(config)?;

        for (index, item) in config.epg.iter().enumerate() {
            self.ensure_epg_item(config, &temp_dir, index, item).await?;
        }

        info!("✅ Configuration is valid: {} guide entries", config.epg.len());
        Ok(())
    }

    async fn ensure_epg_item(
        &self,
        config: &AppConfig,
        temp_dir: &Path,
        index: usize,
        item: &EpgItemConfig,
    ) -> Result<(), ConfigError> {
        let field = |name: &str| format!("epg[{index}].{name}");

        if item.channels.trim().is_empty() {
            return Err(ConfigError::invalid(field("channels"), "must not be empty"));
        }
        if item.source.path.trim().is_empty() {
            return Err(ConfigError::invalid(field("source.path"), "must not be empty"));
        }
        if item.result.path.trim().is_empty() {
            return Err(ConfigError::invalid(field("result.path"), "must not be empty"));
        }

        if !is_file_readable_and_not_empty(Path::new(&item.channels)) {
            return Err(ConfigError::invalid(field("channels"), "file is missing, unreadable or empty"));
        }

        self.ensure_source(config, &item.source.path)
            .await
            .map_err(|reason| ConfigError::invalid(field("source.path"), reason))?;

        if is_unsupported_archive(Path::new(&item.source.path)) {
            return Err(ConfigError::invalid(field("source.path"), "unsupported archive format"));
        }
        if is_unsupported_archive(Path::new(&item.result.path)) {
            return Err(ConfigError::invalid(field("result.path"), "unsupported archive format"));
        }

        if let Some(hash_path) = item.source.hash_path.as_deref().filter(|p| !p.as_os_str().is_empty()) {
            if !is_file_writable(hash_path) {
                return Err(ConfigError::invalid(field("source.hash_path"), "is not writable"));
            }
        }

        match item.result.ftp_name() {
            Some(ftp_name) => {
                let target = transfer_target(config, ftp_name)?;
                self.ensure_remote_result(temp_dir, &target, &item.result.path)
                    .await
                    .map_err(|reason| ConfigError::invalid(field("result.path"), reason))?;

                let staging = staging_path(temp_dir, &item.result.path);
                if !is_file_writable(&staging) {
                    return Err(ConfigError::invalid(
                        field("result.path"),
                        format!("staging file '{}' is not writable", staging.display()),
                    ));
                }
            }
            None => {
                if !is_file_writable(Path::new(&item.result.path)) {
                    return Err(ConfigError::invalid(field("result.path"), "is not writable"));
                }
            }
        }

        debug!("Guide entry {} is valid", index);
        Ok(())
    }

    async fn ensure_source(&self, config: &AppConfig, source: &str) -> Result<(), String> {
        if !is_http_url(source) {
            return if is_file_readable_and_not_empty(Path::new(source)) {
                Ok(())
            } else {
                Err("file is missing, unreadable or empty".to_string())
            };
        }

        if self.skip_remote_checks {
            debug!("Skipping probe of '{}'", source);
            return Ok(());
        }

        if self.fetcher.probe(source, &config.web.mime).await {
            Ok(())
        } else {
            Err("url is unreachable or has a disallowed content type".to_string())
        }
    }

    /// An existing remote file must be overwritable; otherwise a blank file must be
    /// uploadable to that path and removable again.
    async fn ensure_remote_result(&self, temp_dir: &Path, target: &TransferTarget, remote: &str) -> Result<(), String> {
        if self.skip_remote_checks {
            debug!("Skipping FTP checks for '{}'", remote);
            return Ok(());
        }

        let gateway = self.connector.open(target);
        let checked = async {
            if gateway.exists(remote).await {
                return if gateway.is_writable(remote).await {
                    Ok(())
                } else {
                    Err("remote file is not writable".to_string())
                };
            }

            let blank = pick_random_file_path(temp_dir, None);
            fs::write(&blank, b"").map_err(|e| format!("cannot create probe file: {e}"))?;
            let uploaded = gateway.upload(&blank, remote).await;
            try_delete_file(&blank);

            uploaded.map_err(|e| format!("probe upload failed: {e}"))?;
            gateway
                .delete(remote)
                .await
                .map_err(|e| format!("probe delete failed: {e}"))
        }
        .await;

        gateway.close().await;
        checked
    }
}

fn ensure_temp_dir(temp_dir: &Path, delete: bool) -> Result<(), ConfigError> {
    let exists = temp_dir.is_dir();

    if delete && exists && !try_delete_dir(temp_dir, true) {
        return Err(ConfigError::invalid("temp_dir.path", "cannot be cleared"));
    }
    if (delete || !exists) && !try_create_dir(temp_dir) {
        return Err(ConfigError::invalid("temp_dir.path", "cannot be created"));
    }
    debug!("Using temp folder '{}'", temp_dir.display());

    let probe = pick_random_file_path(temp_dir, None);
    if !is_file_writable(&probe) || !try_delete_file(&probe) {
        return Err(ConfigError::invalid("temp_dir.path", "is not writable"));
    }
    Ok(())
}

fn ensure_unique_ftp_names(config: &AppConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for ftp in &config.ftp {
        if !seen.insert(ftp.name.as_str()) {
            return Err(ConfigError::invalid("ftp.name", format!("duplicate name '{}'", ftp.name)));
        }
    }
    Ok(())
}

fn ensure_epg_entries(config: &AppConfig) -> Result<(), ConfigError> {
    if config.epg.is_empty() {
        return Err(ConfigError::invalid("epg", "at least one entry is required"));
    }

    for (index, item) in config.epg.iter().enumerate() {
        if let Some(name) = item.result.ftp_name() {
            if config.ftp_by_name(name).is_none() {
                return Err(ConfigError::invalid(
                    format!("epg[{index}].result.ftp"),
                    format!("no [[ftp]] entry named '{name}'"),
                ));
            }
        }
    }
    Ok(())
}

/// Resolves a named FTP entry into a complete upload target.
pub fn transfer_target(config: &AppConfig, name: &str) -> Result<TransferTarget, ConfigError> {
    let ftp = config
        .ftp_by_name(name)
        .ok_or_else(|| ConfigError::invalid("ftp.name", format!("no [[ftp]] entry named '{name}'")))?;

    if ftp.server.trim().is_empty() {
        return Err(ConfigError::invalid(format!("ftp[{name}].server"), "must not be empty"));
    }
    if ftp.user.trim().is_empty() {
        return Err(ConfigError::invalid(format!("ftp[{name}].user"), "must not be empty"));
    }
    ftp.to_target()
        .ok_or_else(|| ConfigError::invalid(format!("ftp[{name}].password"), "must not be empty"))
}

/// Local file the packer writes before an upload, named like the remote result.
fn staging_path(temp_dir: &Path, remote: &str) -> PathBuf {
    let file_name = Path::new(remote)
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    temp_dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{FetchError, TransferError, TransferGateway};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};

    struct ProbeFetcher {
        reachable: bool,
    }

    #[async_trait]
    impl Fetcher for ProbeFetcher {
        async fn fetch(&self, _url: &str) -> Result<PathBuf, FetchError> {
            Err(FetchError::Status(404))
        }

        async fn probe(&self, _url: &str, _mime: &[String]) -> bool {
            self.reachable
        }
    }

    #[derive(Default)]
    struct RecordingServer {
        existing: bool,
        writable: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    struct RecordingGateway {
        existing: bool,
        writable: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TransferConnector for RecordingServer {
        fn open(&self, _target: &TransferTarget) -> Box<dyn TransferGateway> {
            Box::new(RecordingGateway {
                existing: self.existing,
                writable: self.writable,
                calls: Arc::clone(&self.calls),
            })
        }
    }

    #[async_trait]
    impl TransferGateway for RecordingGateway {
        async fn exists(&self, _remote: &str) -> bool {
            self.calls.lock().unwrap().push("exists".into());
            self.existing
        }

        async fn is_writable(&self, _remote: &str) -> bool {
            self.calls.lock().unwrap().push("is_writable".into());
            self.writable
        }

        async fn upload(&self, _local: &Path, remote: &str) -> Result<(), TransferError> {
            self.calls.lock().unwrap().push(format!("upload {remote}"));
            Ok(())
        }

        async fn delete(&self, remote: &str) -> Result<(), TransferError> {
            self.calls.lock().unwrap().push(format!("delete {remote}"));
            Ok(())
        }

        async fn close(&self) {
            self.calls.lock().unwrap().push("close".into());
        }
    }

    fn local_config(dir: &TempDir) -> AppConfig {
        let channels = dir.path().join("channels.txt");
        let source = dir.path().join("guide.xml");
        std::fs::write(&channels, "a\n").unwrap();
        std::fs::write(&source, "<tv></tv>").unwrap();

        let text = format!(
            r#"
            [temp_dir]
            path = "{temp}"

            [[epg]]
            channels = "{channels}"
            [epg.source]
            path = "{source}"
            [epg.result]
            path = "{result}"
            "#,
            temp = dir.path().join("work").display(),
            channels = channels.display(),
            source = source.display(),
            result = dir.path().join("out.xml").display(),
        );
        AppConfig::from_toml_str(&text).unwrap()
    }

    fn validator(server: RecordingServer) -> ValidateConfigUseCase {
        ValidateConfigUseCase::new(Arc::new(ProbeFetcher { reachable: true }), Arc::new(server), false)
    }

    #[tokio::test]
    async fn test_local_entry_is_valid_and_temp_dir_created() {
        let dir = tempdir().unwrap();
        let config = local_config(&dir);

        validator(RecordingServer::default()).ensure_valid(&config).await.unwrap();
        assert!(dir.path().join("work").is_dir());
        assert!(!dir.path().join("out.xml").exists());
    }

    #[tokio::test]
    async fn test_empty_epg_list_is_rejected() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        config.epg.clear();

        let err = validator(RecordingServer::default()).ensure_valid(&config).await.unwrap_err();
        assert!(err.to_string().contains("epg"));
    }

    #[tokio::test]
    async fn test_unsupported_archive_source_is_rejected() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        let zipped = dir.path().join("guide.zip");
        std::fs::write(&zipped, "PK").unwrap();
        config.epg[0].source.path = zipped.display().to_string();

        let err = validator(RecordingServer::default()).ensure_valid(&config).await.unwrap_err();
        assert!(err.to_string().contains("unsupported archive"));
    }

    #[tokio::test]
    async fn test_empty_channels_file_is_rejected() {
        let dir = tempdir().unwrap();
        let config = local_config(&dir);
        std::fs::write(&config.epg[0].channels, "").unwrap();

        let err = validator(RecordingServer::default()).ensure_valid(&config).await.unwrap_err();
        assert!(err.to_string().contains("channels"));
    }

    #[tokio::test]
    async fn test_unreachable_url_is_rejected_unless_remote_checks_skipped() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        config.epg[0].source.path = "https://example.com/guide.xml.gz".into();

        let strict = ValidateConfigUseCase::new(
            Arc::new(ProbeFetcher { reachable: false }),
            Arc::new(RecordingServer::default()),
            false,
        );
        assert!(strict.ensure_valid(&config).await.is_err());

        let offline = ValidateConfigUseCase::new(
            Arc::new(ProbeFetcher { reachable: false }),
            Arc::new(RecordingServer::default()),
            true,
        );
        assert!(offline.ensure_valid(&config).await.is_ok());
    }

    fn with_ftp(config: &mut AppConfig, names: &[&str]) {
        for name in names {
            config.ftp.push(crate::config::FtpServerConfig {
                name: name.to_string(),
                server: "ftp.example.com".into(),
                port: 21,
                user: "user".into(),
                password: Some("secret".into()),
                password_env: None,
            });
        }
        config.epg[0].result.ftp = Some(names[0].to_string());
        config.epg[0].result.path = "/pub/guide.xml.gz".into();
    }

    #[tokio::test]
    async fn test_duplicate_ftp_names_are_rejected() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        with_ftp(&mut config, &["main", "main"]);

        let err = validator(RecordingServer::default()).ensure_valid(&config).await.unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[tokio::test]
    async fn test_unknown_ftp_reference_is_rejected() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        with_ftp(&mut config, &["main"]);
        config.epg[0].result.ftp = Some("backup".into());

        let err = validator(RecordingServer::default()).ensure_valid(&config).await.unwrap_err();
        assert!(err.to_string().contains("backup"));
    }

    #[tokio::test]
    async fn test_missing_remote_result_is_probed_with_upload_and_delete() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        with_ftp(&mut config, &["main"]);
        let server = RecordingServer::default();
        let calls = Arc::clone(&server.calls);

        validator(server).ensure_valid(&config).await.unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "exists".to_string(),
                "upload /pub/guide.xml.gz".to_string(),
                "delete /pub/guide.xml.gz".to_string(),
                "close".to_string(),
            ]
        );
        // only the staging check and the probe touched the temp dir, both cleaned up
        assert_eq!(std::fs::read_dir(dir.path().join("work")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_existing_read_only_remote_result_is_rejected() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        with_ftp(&mut config, &["main"]);
        let server = RecordingServer {
            existing: true,
            writable: false,
            ..Default::default()
        };

        let err = validator(server).ensure_valid(&config).await.unwrap_err();
        assert!(err.to_string().contains("not writable"));
    }

    #[test]
    fn test_transfer_target_requires_password() {
        let dir = tempdir().unwrap();
        let mut config = local_config(&dir);
        with_ftp(&mut config, &["main"]);
        config.ftp[0].password = None;

        assert!(transfer_target(&config, "main").is_err());
        config.ftp[0].password = Some("secret".into());
        assert_eq!(transfer_target(&config, "main").unwrap().server, "ftp.example.com");
    }
}
