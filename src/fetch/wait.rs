use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use tokio::time::Instant;

use super::FetchOutcome;

/// Suffix Chromium gives a download that is still being written.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".crdownload";

#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Polls `dir` until no partial-download marker is left or `config.timeout`
/// elapses. Absence of markers is a heuristic, not proof the file is whole.
pub async fn wait_for_download(dir: &Path, config: WaitConfig) -> anyhow::Result<FetchOutcome> {
    let deadline = Instant::now() + config.timeout;
    loop {
        let pending = count_partial_downloads(dir).await?;
        if pending == 0 {
            return Ok(FetchOutcome::Completed);
        }

        let now = Instant::now();
        if now >= deadline {
            tracing::debug!(dir = %dir.display(), pending, "download wait timed out");
            return Ok(FetchOutcome::TimedOut);
        }
        tokio::time::sleep(config.poll_interval.min(deadline - now)).await;
    }
}

async fn count_partial_downloads(dir: &Path) -> anyhow::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("read download dir: {}", dir.display()))?;
    let mut count = 0usize;
    while let Some(entry) = entries.next_entry().await.context("read download dir entry")? {
        if entry
            .file_name()
            .to_string_lossy()
            .ends_with(PARTIAL_DOWNLOAD_SUFFIX)
        {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{WaitConfig, wait_for_download};
    use crate::fetch::FetchOutcome;

    fn quick() -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn empty_dir_is_complete_immediately() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        std::fs::write(temp.path().join("paper.pdf"), b"%PDF")?;
        assert_eq!(
            wait_for_download(temp.path(), quick()).await?,
            FetchOutcome::Completed
        );
        Ok(())
    }

    #[tokio::test]
    async fn stuck_marker_times_out_instead_of_blocking() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        std::fs::write(temp.path().join("paper.pdf.crdownload"), b"partial")?;
        let started = std::time::Instant::now();
        assert_eq!(
            wait_for_download(temp.path(), quick()).await?,
            FetchOutcome::TimedOut
        );
        assert!(started.elapsed() < Duration::from_secs(5));
        Ok(())
    }

    #[tokio::test]
    async fn marker_removed_while_polling_completes() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let marker = temp.path().join("paper.pdf.crdownload");
        std::fs::write(&marker, b"partial")?;

        let rename_from = marker.clone();
        let rename_to = temp.path().join("paper.pdf");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            let _ = tokio::fs::rename(rename_from, rename_to).await;
        });

        let config = WaitConfig {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        };
        assert_eq!(
            wait_for_download(temp.path(), config).await?,
            FetchOutcome::Completed
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_dir_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let missing = temp.path().join("nope");
        assert!(wait_for_download(&missing, quick()).await.is_err());
    }
}
