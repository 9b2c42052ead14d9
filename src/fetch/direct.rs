use std::path::Path;

use anyhow::Context as _;
use async_trait::async_trait;
use futures::StreamExt as _;
use tokio::io::AsyncWriteExt as _;
use url::Url;

use super::{FetchOutcome, Fetcher, PARTIAL_DOWNLOAD_SUFFIX, document_file_name};

/// Fetches documents with a plain GET. Suitable for hosts that serve the PDF
/// without scripts or session cookies.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    client: reqwest::Client,
}

impl DirectFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for DirectFetcher {
    async fn fetch(&self, url: &Url, dir: &Path) -> anyhow::Result<FetchOutcome> {
        let name = document_file_name(url)
            .ok_or_else(|| anyhow::anyhow!("cannot derive a file name from {url}"))?;
        let final_path = dir.join(&name);
        if tokio::fs::try_exists(&final_path).await.unwrap_or(false) {
            tracing::info!(path = %final_path.display(), "document already present; skipping");
            return Ok(FetchOutcome::Completed);
        }
        let partial_path = dir.join(format!("{name}{PARTIAL_DOWNLOAD_SUFFIX}"));

        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return Ok(FetchOutcome::TimedOut),
            Err(err) => return Err(err).with_context(|| format!("GET {url}")),
        };
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("GET {url} returned {status}");
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&partial_path)
            .await
            .with_context(|| format!("create partial download: {}", partial_path.display()))?;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&partial_path).await;
                    if err.is_timeout() {
                        return Ok(FetchOutcome::TimedOut);
                    }
                    return Err(err).with_context(|| format!("read body of {url}"));
                }
            };
            file.write_all(&chunk)
                .await
                .with_context(|| format!("write {}", partial_path.display()))?;
        }
        file.flush()
            .await
            .with_context(|| format!("flush {}", partial_path.display()))?;
        drop(file);

        tokio::fs::rename(&partial_path, &final_path)
            .await
            .with_context(|| format!("finalize download: {}", final_path.display()))?;
        Ok(FetchOutcome::Completed)
    }
}
