use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::parser::ChannelWhitelist;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("connection to {server}:{port} failed: {reason}")]
    Connect {
        server: String,
        port: u16,
        reason: String,
    },

    #[error("{operation} rejected: {reason}")]
    Rejected {
        operation: &'static str,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Downloads remote guide documents into the working directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` into a fresh temporary file and return its path.
    async fn fetch(&self, url: &str) -> Result<PathBuf, FetchError>;

    /// Cheap reachability check. An empty `mime` list accepts any content type.
    async fn probe(&self, url: &str, mime: &[String]) -> bool;
}

/// Where and as whom to upload results.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferTarget {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for TransferTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTarget")
            .field("name", &self.name)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// A session against one remote server. Connects lazily, stays open until `close`.
#[async_trait]
pub trait TransferGateway: Send + Sync {
    async fn exists(&self, remote: &str) -> bool;
    async fn is_writable(&self, remote: &str) -> bool;
    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError>;
    async fn delete(&self, remote: &str) -> Result<(), TransferError>;
    async fn close(&self);
}

/// Opens transfer sessions keyed by the target's server, port and credentials.
pub trait TransferConnector: Send + Sync {
    fn open(&self, target: &TransferTarget) -> Box<dyn TransferGateway>;
}

/// Gzip compression of a finished artifact.
pub trait Packer: Send + Sync {
    fn pack(&self, source: &Path, dest: &Path) -> std::io::Result<()>;
}

/// Loads the set of channel ids a run keeps.
pub trait WhitelistSource: Send + Sync {
    fn load(&self, path: &Path) -> std::io::Result<ChannelWhitelist>;
}
