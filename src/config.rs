use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::app::ports::TransferTarget;
use crate::constants::{
    DEFAULT_FTP_PORT, DEFAULT_LOG_DIR, DEFAULT_LOG_FILE, DEFAULT_LOG_LEVEL, DEFAULT_TEMP_DIR_NAME,
};
use crate::parser::WhitelistOptions;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML deserialization failed for '{}': {source}", path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("JSON deserialization failed for '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub temp_dir: TempDirConfig,
    pub web: WebConfig,
    pub archiving: ArchivingConfig,
    pub channels: ChannelsConfig,
    pub ftp: Vec<FtpServerConfig>,
    pub epg: Vec<EpgItemConfig>,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TempDirConfig {
    pub path: Option<PathBuf>,
    /// Wipe the working directory before the first run and after every run.
    pub delete: bool,
}

impl TempDirConfig {
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => std::env::temp_dir().join(DEFAULT_TEMP_DIR_NAME),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub user_agent: Option<String>,
    /// Content types accepted when probing remote sources. Empty accepts anything.
    pub mime: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GzipCompression {
    #[default]
    Optimal,
    Fastest,
    NoCompression,
    SmallestSize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArchivingConfig {
    pub gzip_compression: GzipCompression,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub trim_start: bool,
    pub trim_end: bool,
    pub ignore_case: bool,
}

impl ChannelsConfig {
    pub fn whitelist_options(&self) -> WhitelistOptions {
        WhitelistOptions {
            trim_start: self.trim_start,
            trim_end: self.trim_end,
            ignore_case: self.ignore_case,
        }
    }
}

fn default_ftp_port() -> u16 {
    DEFAULT_FTP_PORT
}

#[derive(Debug, Clone, Deserialize)]
pub struct FtpServerConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Name of an environment variable holding the password; wins over `password`.
    #[serde(default)]
    pub password_env: Option<String>,
}

impl FtpServerConfig {
    pub fn resolve_password(&self) -> Option<String> {
        self.password_env
            .as_deref()
            .filter(|var| !var.trim().is_empty())
            .and_then(|var| std::env::var(var).ok())
            .or_else(|| self.password.clone())
            .filter(|password| !password.trim().is_empty())
    }

    pub fn to_target(&self) -> Option<TransferTarget> {
        Some(TransferTarget {
            name: self.name.clone(),
            server: self.server.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.resolve_password()?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EpgItemConfig {
    /// Whitelist file, one channel id per line.
    pub channels: String,
    pub source: EpgSourceConfig,
    pub result: EpgResultConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EpgSourceConfig {
    /// Local path or http(s) URL.
    pub path: String,
    pub hash_path: Option<PathBuf>,
    pub ignore_hash: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EpgResultConfig {
    pub path: String,
    /// Name of an `[[ftp]]` entry; blank keeps the result local.
    pub ftp: Option<String>,
}

impl EpgResultConfig {
    pub fn ftp_name(&self) -> Option<&str> {
        self.ftp.as_deref().map(str::trim).filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIR),
            file_name: DEFAULT_LOG_FILE.to_string(),
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus exposition file written when the process exits.
    pub textfile: Option<PathBuf>,
}

impl AppConfig {
    /// Load `path`, then merge `appsettings.<env>.<ext>` next to it when `env` is given
    /// and that file exists.
    pub fn load(path: &Path, env: Option<&str>) -> Result<Self, ConfigError> {
        let mut document = read_document(path)?;

        if let Some(overlay_path) = env.and_then(|env| overlay_path(path, env)) {
            if overlay_path.is_file() {
                debug!("Merging config overlay '{}'", overlay_path.display());
                merge(&mut document, read_document(&overlay_path)?);
            }
        }

        serde_json::from_value(document).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: PathBuf::new(),
            source,
        })
    }

    pub fn ftp_by_name(&self, name: &str) -> Option<&FtpServerConfig> {
        self.ftp.iter().find(|ftp| ftp.name == name)
    }
}

fn overlay_path(base: &Path, env: &str) -> Option<PathBuf> {
    let env = env.trim();
    if env.is_empty() {
        return None;
    }

    let stem = base.file_stem()?.to_str()?;
    let file_name = match base.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}.{env}.{ext}"),
        None => format!("{stem}.{env}"),
    };
    Some(base.with_file_name(file_name))
}

fn read_document(path: &Path) -> Result<Value, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        toml::from_str(&text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Tables merge key by key; any other overlay value replaces the base value.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
