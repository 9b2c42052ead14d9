//! Document retrieval.
//!
//! A [`Fetcher`] places the document behind a resolved URL into a local
//! directory. Two access patterns exist: [`BrowserFetcher`] drives a headless
//! Chromium for publishers that gate PDFs behind scripts or session state,
//! [`DirectFetcher`] issues a plain GET. Both report a [`FetchOutcome`]; an
//! `Err` is the third, hard-failure state.

mod browser;
mod direct;
mod wait;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use clap::ValueEnum;
use url::Url;

pub use browser::{BrowserFetcher, BrowserFetcherConfig};
pub use direct::DirectFetcher;
pub use wait::{PARTIAL_DOWNLOAD_SUFFIX, WaitConfig, wait_for_download};

use crate::cli::FetchArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed,
    /// The download did not settle in time. A partial file may be present.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Completed,
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FetchReport {
    pub url: Url,
    pub status: FetchStatus,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, dir: &Path) -> anyhow::Result<FetchOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetcherKind {
    Browser,
    Direct,
}

pub async fn run(args: FetchArgs) -> anyhow::Result<()> {
    let links_path = args
        .links
        .clone()
        .unwrap_or_else(|| args.family.default_links_file());
    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| args.family.default_pending_dir());

    let links = crate::links::read_alert_links(&links_path)?;
    let client = crate::net::build_client(&args.network.to_config()).context("resolver client")?;
    let urls =
        crate::resolve::resolve_all(&client, &links, args.family, args.resolve_concurrency).await;

    let fetcher = build_fetcher(&args)?;
    let reports = fetch_all(fetcher, &urls, &dir, args.concurrency).await?;
    log_summary(&reports);
    Ok(())
}

pub fn build_fetcher(args: &FetchArgs) -> anyhow::Result<Arc<dyn Fetcher>> {
    let fetcher: Arc<dyn Fetcher> = match args.fetcher {
        FetcherKind::Browser => Arc::new(BrowserFetcher::new(BrowserFetcherConfig {
            chrome_executable: args.chrome.clone(),
            headless: !args.headed,
            proxy: args.network.proxy.clone(),
            settle: Duration::from_secs(args.settle_secs),
            wait: WaitConfig {
                timeout: Duration::from_secs(args.timeout_secs),
                poll_interval: Duration::from_millis(args.poll_ms),
            },
        })),
        FetcherKind::Direct => {
            let mut network = args.network.to_config();
            network.timeout = Some(Duration::from_secs(args.timeout_secs));
            let client = crate::net::build_client(&network).context("download client")?;
            Arc::new(DirectFetcher::new(client))
        }
    };
    Ok(fetcher)
}

/// Fetches every URL into `dir` with at most `concurrency` fetches running.
/// Each URL yields exactly one report; failures stay inside their task.
pub async fn fetch_all(
    fetcher: Arc<dyn Fetcher>,
    urls: &[Url],
    dir: &Path,
    concurrency: usize,
) -> anyhow::Result<Vec<FetchReport>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create download dir: {}", dir.display()))?;
    let dir = std::path::absolute(dir)
        .with_context(|| format!("absolutize download dir: {}", dir.display()))?;

    let concurrency = concurrency.max(1);
    let mut join_set = tokio::task::JoinSet::new();
    let mut next_idx = 0usize;
    let mut reports: Vec<Option<FetchReport>> = vec![None; urls.len()];
    let mut task_urls = std::collections::HashMap::new();

    while next_idx < urls.len() || !join_set.is_empty() {
        while next_idx < urls.len() && join_set.len() < concurrency {
            let idx = next_idx;
            let url = urls[idx].clone();
            let fetcher = Arc::clone(&fetcher);
            let dir = dir.clone();
            tracing::info!(%url, "fetch start");
            let handle = join_set.spawn(async move {
                let status = match fetcher.fetch(&url, &dir).await {
                    Ok(FetchOutcome::Completed) => FetchStatus::Completed,
                    Ok(FetchOutcome::TimedOut) => FetchStatus::TimedOut,
                    Err(err) => FetchStatus::Failed(format!("{err:#}")),
                };
                (idx, FetchReport { url, status })
            });
            task_urls.insert(handle.id(), idx);
            next_idx += 1;
        }

        let Some(joined) = join_set.join_next_with_id().await else {
            break;
        };
        match joined {
            Ok((_, (idx, report))) => {
                match &report.status {
                    FetchStatus::Completed => tracing::info!(url = %report.url, "fetch completed"),
                    FetchStatus::TimedOut => {
                        tracing::warn!(url = %report.url, "fetch did not complete within timeout")
                    }
                    FetchStatus::Failed(error) => {
                        tracing::warn!(url = %report.url, %error, "fetch failed")
                    }
                }
                reports[idx] = Some(report);
            }
            Err(err) => {
                let Some(idx) = task_urls.get(&err.id()).copied() else {
                    tracing::error!(?err, "fetch task failed");
                    continue;
                };
                tracing::warn!(url = %urls[idx], ?err, "fetch task panicked");
                reports[idx] = Some(FetchReport {
                    url: urls[idx].clone(),
                    status: FetchStatus::Failed(format!("task failed: {err}")),
                });
            }
        }
    }

    Ok(reports.into_iter().flatten().collect())
}

fn log_summary(reports: &[FetchReport]) {
    let completed = reports
        .iter()
        .filter(|r| r.status == FetchStatus::Completed)
        .count();
    let timed_out = reports
        .iter()
        .filter(|r| r.status == FetchStatus::TimedOut)
        .count();
    let failed = reports.len() - completed - timed_out;
    tracing::info!(
        total = reports.len(),
        completed,
        timed_out,
        failed,
        "fetch complete"
    );
}

/// File name for a document fetched from `url`: the last path segment, with
/// `.pdf` appended when it has no such extension.
pub fn document_file_name(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;
    if segment == "." || segment == ".." {
        return None;
    }
    if segment.to_ascii_lowercase().ends_with(".pdf") {
        Some(segment.to_owned())
    } else {
        Some(format!("{segment}.pdf"))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use async_trait::async_trait;
    use url::Url;

    use super::{FetchOutcome, FetchStatus, Fetcher, document_file_name, fetch_all};

    struct ScriptedFetcher;

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &Url, _dir: &Path) -> anyhow::Result<FetchOutcome> {
            match url.path() {
                "/ok" => Ok(FetchOutcome::Completed),
                "/slow" => Ok(FetchOutcome::TimedOut),
                "/panic" => panic!("browser crashed"),
                _ => anyhow::bail!("navigation failed"),
            }
        }
    }

    #[tokio::test]
    async fn fetch_all_reports_every_url_in_order() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let urls = ["/ok", "/slow", "/broken", "/panic"]
            .iter()
            .map(|p| Url::parse(&format!("https://example.com{p}")).unwrap())
            .collect::<Vec<_>>();

        let reports = fetch_all(Arc::new(ScriptedFetcher), &urls, temp.path(), 2).await?;

        let statuses = reports.iter().map(|r| r.status.clone()).collect::<Vec<_>>();
        assert_eq!(statuses.len(), 4);
        assert_eq!(statuses[0], FetchStatus::Completed);
        assert_eq!(statuses[1], FetchStatus::TimedOut);
        assert!(matches!(&statuses[2], FetchStatus::Failed(msg) if msg.contains("navigation failed")));
        assert!(matches!(&statuses[3], FetchStatus::Failed(_)));
        assert_eq!(reports[3].url.path(), "/panic");
        Ok(())
    }

    #[test]
    fn file_name_comes_from_last_segment() {
        let url = Url::parse("https://journals.aps.org/prl/pdf/10.1103/PhysRevLett.134.098401")
            .unwrap();
        assert_eq!(
            document_file_name(&url).as_deref(),
            Some("PhysRevLett.134.098401.pdf")
        );

        let url = Url::parse("https://example.com/files/Paper.PDF?download=true").unwrap();
        assert_eq!(document_file_name(&url).as_deref(), Some("Paper.PDF"));

        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(document_file_name(&url), None);
    }
}
