use std::path::PathBuf;

use crate::app::ports::TransferTarget;
use crate::config::ConfigError;
use crate::parser::SourceEncoding;

/// One unit of work for the orchestrator. Read-only once built.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Local path or http(s) URL of the guide document.
    pub source: String,
    /// Forced source encoding; `None` picks it from the acquired file's extension.
    pub source_encoding: Option<SourceEncoding>,
    /// Whitelist file.
    pub channels: PathBuf,
    /// Final destination: a local path, or the remote path when `transfer` is set.
    pub result: PathBuf,
    pub fingerprint_record: Option<PathBuf>,
    pub transfer: Option<TransferTarget>,
    /// Process even when the source fingerprint matches the saved one.
    pub force: bool,
}

impl RunRequest {
    pub fn new(source: impl Into<String>, channels: impl Into<PathBuf>, result: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            source_encoding: None,
            channels: channels.into(),
            result: result.into(),
            fingerprint_record: None,
            transfer: None,
            force: false,
        }
    }

    pub fn with_fingerprint_record(mut self, record: impl Into<PathBuf>) -> Self {
        self.fingerprint_record = Some(record.into());
        self
    }

    pub fn with_transfer(mut self, target: TransferTarget) -> Self {
        self.transfer = Some(target);
        self
    }

    pub fn with_source_encoding(mut self, encoding: SourceEncoding) -> Self {
        self.source_encoding = Some(encoding);
        self
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Source, channels and result locators must all be present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.trim().is_empty() {
            return Err(ConfigError::invalid("source.path", "must not be empty"));
        }
        if self.channels.as_os_str().is_empty() {
            return Err(ConfigError::invalid("channels", "must not be empty"));
        }
        if self.result.as_os_str().is_empty() {
            return Err(ConfigError::invalid("result.path", "must not be empty"));
        }
        if self.result.file_name().is_none() {
            return Err(ConfigError::invalid("result.path", "must name a file"));
        }
        if self.transfer.is_none() && PathBuf::from(&self.source) == self.result {
            return Err(ConfigError::invalid("result.path", "must differ from the source"));
        }
        Ok(())
    }

    /// The result path as the remote server should see it.
    pub fn remote_result(&self) -> String {
        self.result.to_string_lossy().replace('\\', "/")
    }
}
