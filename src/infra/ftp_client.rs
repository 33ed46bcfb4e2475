use async_trait::async_trait;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::{debug, info};

use crate::app::ports::{TransferConnector, TransferError, TransferGateway, TransferTarget};

/// Opens a fresh `FtpGateway` per run.
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpConnector;

impl TransferConnector for FtpConnector {
    fn open(&self, target: &TransferTarget) -> Box<dyn TransferGateway> {
        Box::new(FtpGateway::new(target.clone()))
    }
}

/// FTP session against one server.
///
/// `suppaftp`'s client is blocking, so every command runs on the blocking pool with
/// the stream behind a mutex. The login happens on the first command.
pub struct FtpGateway {
    target: TransferTarget,
    session: Arc<Mutex<Option<FtpStream>>>,
}

impl FtpGateway {
    pub fn new(target: TransferTarget) -> Self {
        Self {
            target,
            session: Arc::new(Mutex::new(None)),
        }
    }

    async fn with_session<T, F>(&self, operation: &'static str, command: F) -> Result<T, TransferError>
    where
        F: FnOnce(&mut FtpStream) -> Result<T, FtpError> + Send + 'static,
        T: Send + 'static,
    {
        let session = Arc::clone(&self.session);
        let target = self.target.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = session.lock().map_err(|_| rejected(operation, "session lock poisoned"))?;
            if guard.is_none() {
                *guard = Some(connect(&target)?);
            }
            let Some(stream) = guard.as_mut() else {
                return Err(rejected(operation, "no session"));
            };
            command(stream).map_err(|e| rejected(operation, e))
        })
        .await
        .map_err(|e| rejected(operation, e))?
    }
}

fn rejected(operation: &'static str, reason: impl ToString) -> TransferError {
    TransferError::Rejected {
        operation,
        reason: reason.to_string(),
    }
}

fn connect(target: &TransferTarget) -> Result<FtpStream, TransferError> {
    let failed = |e: FtpError| TransferError::Connect {
        server: target.server.clone(),
        port: target.port,
        reason: e.to_string(),
    };

    let mut stream = FtpStream::connect((target.server.as_str(), target.port)).map_err(failed)?;
    stream.login(&target.user, &target.password).map_err(failed)?;
    stream.transfer_type(FileType::Binary).map_err(failed)?;

    info!("Connected to FTP server '{}' ({}:{})", target.name, target.server, target.port);
    Ok(stream)
}

/// Owner write bit of a unix style listing line, e.g. `-rw-r--r-- 1 ftp ftp 12 Jan 01 00:00 guide.xml`.
fn owner_can_write(listing_line: &str) -> bool {
    listing_line
        .split_whitespace()
        .next()
        .filter(|mode| mode.len() >= 10)
        .and_then(|mode| mode.chars().nth(2))
        .is_some_and(|bit| bit == 'w')
}

#[async_trait]
impl TransferGateway for FtpGateway {
    async fn exists(&self, remote: &str) -> bool {
        let path = remote.to_string();
        match self.with_session("size", move |ftp| ftp.size(&path)).await {
            Ok(_) => true,
            Err(e) => {
                debug!("Remote file '{}' not found: {}", remote, e);
                false
            }
        }
    }

    async fn is_writable(&self, remote: &str) -> bool {
        let path = remote.to_string();
        match self.with_session("list", move |ftp| ftp.list(Some(path.as_str()))).await {
            Ok(lines) => lines.first().is_some_and(|line| owner_can_write(line)),
            Err(e) => {
                info!("Failed to get permissions of remote file '{}': {}", remote, e);
                false
            }
        }
    }

    async fn upload(&self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let mut file = File::open(local)?;
        let path = remote.to_string();

        let written = self
            .with_session("upload", move |ftp| ftp.put_file(&path, &mut file))
            .await?;
        debug!("Uploaded {} bytes to '{}'", written, remote);
        Ok(())
    }

    async fn delete(&self, remote: &str) -> Result<(), TransferError> {
        let path = remote.to_string();
        self.with_session("delete", move |ftp| ftp.rm(&path)).await
    }

    async fn close(&self) {
        let session = Arc::clone(&self.session);
        let closed = tokio::task::spawn_blocking(move || {
            let stream = session.lock().ok().and_then(|mut guard| guard.take());
            if let Some(mut stream) = stream {
                if let Err(e) = stream.quit() {
                    debug!("FTP quit failed: {}", e);
                }
                return true;
            }
            false
        })
        .await;

        if matches!(closed, Ok(true)) {
            debug!("Disconnected from FTP server '{}'", self.target.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_write_bit() {
        assert!(owner_can_write("-rw-r--r--   1 ftp  ftp  1024 Jan 01 00:00 guide.xml.gz"));
        assert!(owner_can_write("-rwxrwxrwx 1 ftp ftp 1 Jan 01 00:00 a"));
        assert!(!owner_can_write("-r--rw-rw- 1 ftp ftp 1 Jan 01 00:00 a"));
        assert!(!owner_can_write("garbage"));
        assert!(!owner_can_write(""));
    }

    #[tokio::test]
    async fn test_close_without_session_is_noop() {
        let gateway = FtpGateway::new(TransferTarget {
            name: "main".into(),
            server: "127.0.0.1".into(),
            port: 21,
            user: "u".into(),
            password: "p".into(),
        });

        gateway.close().await;
        assert!(gateway.session.lock().map(|guard| guard.is_none()).unwrap_or(false));
    }
}
