use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::family::SourceFamily;
use crate::fetch::FetcherKind;
use crate::net::NetworkConfig;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve alert links into direct document URLs.
    Resolve(ResolveArgs),
    /// Resolve alert links and download the documents.
    Fetch(FetchArgs),
    /// Summarize pending documents, retrying leftovers up to --patience passes.
    Summarize(SummarizeArgs),
    /// Resolve, fetch and summarize in one go.
    Run(RunArgs),
    /// Send a greeting to the summarization service and print the reply.
    Check(CheckArgs),
}

#[derive(Debug, Clone, Args)]
pub struct NetworkArgs {
    /// Proxy for outbound requests, e.g. `http://127.0.0.1:7890`.
    #[arg(long)]
    pub proxy: Option<String>,

    /// Timeout for each resolution or summarization request.
    #[arg(long, default_value_t = 300)]
    pub http_timeout_secs: u64,
}

impl NetworkArgs {
    pub fn to_config(&self) -> NetworkConfig {
        NetworkConfig {
            proxy: self.proxy.clone(),
            timeout: Some(Duration::from_secs(self.http_timeout_secs)),
        }
    }
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    #[arg(long, value_enum)]
    pub family: SourceFamily,

    /// Links file, one URL per line (default: `data/<family>_email_links.txt`).
    #[arg(long)]
    pub links: Option<PathBuf>,

    /// Write resolved URLs here instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Maximum concurrent resolutions.
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    #[command(flatten)]
    pub network: NetworkArgs,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[arg(long, value_enum)]
    pub family: SourceFamily,

    /// Links file, one URL per line (default: `data/<family>_email_links.txt`).
    #[arg(long)]
    pub links: Option<PathBuf>,

    /// Download directory (default: `data/<family>_downloaded_pdfs`).
    #[arg(long)]
    pub dir: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FetcherKind::Browser)]
    pub fetcher: FetcherKind,

    /// Maximum concurrent downloads (each browser download is its own Chromium).
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Maximum concurrent resolutions.
    #[arg(long, default_value_t = 8)]
    pub resolve_concurrency: usize,

    /// Delay after navigation before polling for completion.
    #[arg(long, default_value_t = 8)]
    pub settle_secs: u64,

    /// Give up waiting for a download after this long.
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Interval between download-completion checks.
    #[arg(long, default_value_t = 1000)]
    pub poll_ms: u64,

    /// Chromium executable (default: auto-detect).
    #[arg(long)]
    pub chrome: Option<PathBuf>,

    /// Show the browser window.
    #[arg(long)]
    pub headed: bool,

    #[command(flatten)]
    pub network: NetworkArgs,
}

#[derive(Debug, Clone, Args)]
pub struct SummaryArgs {
    /// File whose first line is the API key (default: $PAPERDIGEST_API_KEY).
    #[arg(long)]
    pub api_key_file: Option<PathBuf>,

    /// Base URL of the chat-completions API.
    #[arg(long, default_value = crate::summarize::DEFAULT_BASE_URL)]
    pub base_url: String,

    #[arg(long, default_value = crate::summarize::DEFAULT_MODEL)]
    pub model: String,

    /// Language the summary is written in.
    #[arg(long, default_value = "Chinese")]
    pub language: String,

    #[arg(long, default_value_t = 2048)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 0.3)]
    pub temperature: f32,
}

#[derive(Debug, Args)]
pub struct SummarizeArgs {
    #[arg(long, value_enum)]
    pub family: SourceFamily,

    /// Pending directory (default: `data/<family>_downloaded_pdfs`).
    #[arg(long)]
    pub pending: Option<PathBuf>,

    /// Processed directory (default: `data/<family>_summarized_pdfs`).
    #[arg(long)]
    pub processed: Option<PathBuf>,

    /// Directory holding the summary file.
    #[arg(long, default_value = "summary")]
    pub output_dir: PathBuf,

    /// Summary file name (default: `<family>-summary-<YYYY-MM-DD>.txt`).
    #[arg(long)]
    pub output_name: Option<String>,

    /// Maximum documents summarized at once.
    #[arg(long, default_value_t = crate::pipeline::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Maximum passes over the pending directory.
    #[arg(long, default_value_t = crate::pipeline::DEFAULT_PATIENCE)]
    pub patience: usize,

    #[command(flatten)]
    pub summary: SummaryArgs,

    #[command(flatten)]
    pub network: NetworkArgs,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Processed directory (default: `data/<family>_summarized_pdfs`).
    #[arg(long)]
    pub processed: Option<PathBuf>,

    /// Directory holding the summary file.
    #[arg(long, default_value = "summary")]
    pub output_dir: PathBuf,

    /// Summary file name (default: `<family>-summary-<YYYY-MM-DD>.txt`).
    #[arg(long)]
    pub output_name: Option<String>,

    /// Maximum documents summarized at once.
    #[arg(long, default_value_t = crate::pipeline::DEFAULT_CONCURRENCY)]
    pub summarize_concurrency: usize,

    /// Maximum passes over the pending directory.
    #[arg(long, default_value_t = crate::pipeline::DEFAULT_PATIENCE)]
    pub patience: usize,

    #[command(flatten)]
    pub summary: SummaryArgs,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Message sent to the service.
    #[arg(long, default_value = "Hello!")]
    pub message: String,

    #[command(flatten)]
    pub summary: SummaryArgs,

    #[command(flatten)]
    pub network: NetworkArgs,
}
