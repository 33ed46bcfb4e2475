//! Shared names and defaults used across the repacker

/// Extensions that mark a gzip-framed source or result.
pub const GZIP_EXTENSIONS: &[&str] = &["gz", "gzip"];

/// Archive formats the repacker refuses to read or produce.
pub const UNSUPPORTED_ARCHIVE_EXTENSIONS: &[&str] =
    &["zip", "7z", "rar", "tar", "bz2", "bz", "tgz", "tbz2", "tbz"];

/// Folder created under the system temp directory when none is configured.
pub const DEFAULT_TEMP_DIR_NAME: &str = "EPG_Repacker";

pub const DEFAULT_CONFIG_PATH: &str = "config/appsettings.toml";

pub const DEFAULT_FTP_PORT: u16 = 21;

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "epg_repacker.log";
pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_USER_AGENT: &str = concat!("epg_repacker/", env!("CARGO_PKG_VERSION"));
