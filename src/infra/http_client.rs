use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::app::ports::{FetchError, Fetcher};
use crate::constants::DEFAULT_USER_AGENT;
use crate::paths::pick_random_file_path;

/// Fetches guide documents over HTTP(S) into the working directory.
///
/// The body is streamed to disk chunk by chunk. The temp file takes the extension of
/// the final URL after redirects so the filter can tell gzip sources apart.
pub struct HttpFetcher {
    client: reqwest::Client,
    work_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(work_dir: impl Into<PathBuf>, user_agent: Option<&str>) -> Result<Self, FetchError> {
        let user_agent = user_agent
            .map(str::trim)
            .filter(|agent| !agent.is_empty())
            .unwrap_or(DEFAULT_USER_AGENT);
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            work_dir: work_dir.into(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<PathBuf, FetchError> {
        let mut resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let extension = Path::new(resp.url().path())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_owned);
        let target = pick_random_file_path(&self.work_dir, extension.as_deref());
        debug!("Downloading '{}' into '{}'", url, target.display());

        let mut file = tokio::fs::File::create(&target).await?;
        let mut written: u64 = 0;
        let streamed: Result<(), FetchError> = async {
            while let Some(chunk) = resp.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = streamed {
            drop(file);
            if let Err(remove_err) = tokio::fs::remove_file(&target).await {
                info!("Failed to delete partial download '{}': {}", target.display(), remove_err);
            }
            return Err(e);
        }

        info!("Fetched {} bytes from '{}'", written, url);
        Ok(target)
    }

    async fn probe(&self, url: &str, mime: &[String]) -> bool {
        let resp = match self.client.head(url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                info!("Url '{}' is unreachable: {}", url, e);
                return false;
            }
        };

        if !resp.status().is_success() {
            info!("Url '{}' answered with status {}", url, resp.status());
            return false;
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if mime_accepted(content_type, mime) {
            true
        } else {
            info!("Url '{}' has content type '{}' which is not allowed", url, content_type);
            false
        }
    }
}

/// Compares the media type without parameters. An empty allow list accepts anything.
fn mime_accepted(content_type: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let media_type = content_type.split(';').next().unwrap_or_default().trim();
    allowed
        .iter()
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(media_type))
}
