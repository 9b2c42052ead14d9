use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt as _;
use url::Url;

use super::{FetchOutcome, Fetcher, WaitConfig, wait_for_download};

#[derive(Debug, Clone)]
pub struct BrowserFetcherConfig {
    /// Chromium binary. Auto-detected when unset.
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
    pub proxy: Option<String>,
    /// Pause after navigation so the download has a chance to start.
    pub settle: Duration,
    pub wait: WaitConfig,
}

impl Default for BrowserFetcherConfig {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            headless: true,
            proxy: None,
            settle: Duration::from_secs(8),
            wait: WaitConfig::default(),
        }
    }
}

/// Downloads documents by navigating a fresh Chromium instance to them.
/// Every fetch owns its own browser process and profile.
#[derive(Debug, Clone)]
pub struct BrowserFetcher {
    config: BrowserFetcherConfig,
}

impl BrowserFetcher {
    pub fn new(config: BrowserFetcherConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &Url, dir: &Path) -> anyhow::Result<FetchOutcome> {
        let mut session = BrowserSession::launch(&self.config, dir)
            .await
            .context("launch browser")?;
        let outcome = session.download(url, dir, &self.config).await;
        session.close().await;
        outcome
    }
}

/// One running Chromium plus the task pumping its CDP events. Dropping the
/// session without `close` still kills the process and stops the handler.
struct BrowserSession {
    browser: Browser,
    handler: tokio::task::JoinHandle<()>,
    _profile: tempfile::TempDir,
}

impl BrowserSession {
    async fn launch(config: &BrowserFetcherConfig, download_dir: &Path) -> anyhow::Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix("paperdigest-chrome-")
            .tempdir()
            .context("create browser profile dir")?;
        write_download_preferences(profile.path(), download_dir)?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .window_size(1, 1)
            .arg("--disable-gpu")
            .arg("--window-position=0,1280")
            .arg("--disable-dev-shm-usage");
        if config.headless {
            builder = builder.new_headless_mode();
        } else {
            builder = builder.with_head();
        }
        if let Some(bin) = config.chrome_executable.as_deref() {
            builder = builder.chrome_executable(bin);
        }
        if let Some(proxy) = config.proxy.as_deref() {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        if std::env::var_os("CI").is_some() || std::env::var_os("NO_SANDBOX").is_some() {
            builder = builder.no_sandbox();
        }
        let browser_config = builder
            .build()
            .map_err(|err| anyhow::anyhow!("build browser config: {err}"))?;

        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .context("start chromium")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(err) = event {
                    tracing::debug!(?err, "chromium handler stopped");
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler,
            _profile: profile,
        })
    }

    async fn download(
        &mut self,
        url: &Url,
        dir: &Path,
        config: &BrowserFetcherConfig,
    ) -> anyhow::Result<FetchOutcome> {
        let download_path = dir
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("download dir is not UTF-8: {}", dir.display()))?;
        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_path)
            .build()
            .map_err(|err| anyhow::anyhow!("build download behavior: {err}"))?;
        self.browser
            .execute(behavior)
            .await
            .context("set download behavior")?;

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("open page")?;
        // Navigations that turn into downloads are reported as aborted.
        if let Err(err) = page.goto(url.as_str()).await {
            tracing::debug!(%url, %err, "navigation ended without a page");
        }

        tokio::time::sleep(config.settle).await;
        let outcome = wait_for_download(dir, config.wait).await?;
        if let Err(err) = page.close().await {
            tracing::debug!(%url, %err, "close page");
        }
        Ok(outcome)
    }

    async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            tracing::debug!(%err, "close browser");
        }
        if let Err(err) = self.browser.wait().await {
            tracing::debug!(%err, "wait for browser exit");
        }
        self.handler.abort();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Seeds the profile so Chromium saves PDFs to `download_dir` instead of
/// opening them in its viewer.
fn write_download_preferences(profile_dir: &Path, download_dir: &Path) -> anyhow::Result<()> {
    let default_dir = profile_dir.join("Default");
    std::fs::create_dir_all(&default_dir)
        .with_context(|| format!("create profile dir: {}", default_dir.display()))?;

    let prefs = serde_json::json!({
        "download": {
            "default_directory": download_dir.to_string_lossy(),
            "prompt_for_download": false,
            "directory_upgrade": true,
        },
        "plugins": {
            "always_open_pdf_externally": true,
        },
    });
    let path = default_dir.join("Preferences");
    std::fs::write(&path, serde_json::to_vec(&prefs).context("serialize preferences")?)
        .with_context(|| format!("write preferences: {}", path.display()))?;
    Ok(())
}
