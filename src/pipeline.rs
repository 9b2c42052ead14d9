//! Batch orchestration over the pending directory.
//!
//! A document's state is its location: a file in the pending directory has
//! not been summarized yet, a file in the processed directory has. There is
//! no third state; a document that keeps failing simply stays pending once
//! the patience budget is spent.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::cli::SummarizeArgs;
use crate::extract::{DocumentReader, PdfReader};
use crate::family::SourceFamily;
use crate::record::{RecordOutcome, ResultRecorder};
use crate::summarize::SummaryClient;

pub const DEFAULT_CONCURRENCY: usize = 16;
pub const DEFAULT_PATIENCE: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub documents: usize,
    pub recorded: usize,
    pub rejected: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatienceReport {
    pub passes: usize,
    pub remaining: usize,
}

/// Extract → summarize → record, fanned out over a bounded set of tasks.
#[derive(Clone)]
pub struct Pipeline {
    family: SourceFamily,
    pending_dir: PathBuf,
    reader: Arc<dyn DocumentReader>,
    summarizer: SummaryClient,
    recorder: Arc<ResultRecorder>,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        family: SourceFamily,
        pending_dir: impl Into<PathBuf>,
        reader: Arc<dyn DocumentReader>,
        summarizer: SummaryClient,
        recorder: Arc<ResultRecorder>,
    ) -> Self {
        Self {
            family,
            pending_dir: pending_dir.into(),
            reader,
            summarizer,
            recorder,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Runs batches until the pending directory is empty or `patience`
    /// passes have been made.
    pub async fn run_with_patience(&self, patience: usize) -> anyhow::Result<PatienceReport> {
        let mut passes = 0usize;
        loop {
            let pending = list_pending(&self.pending_dir).await?;
            if pending.is_empty() {
                break;
            }
            if passes >= patience {
                tracing::warn!(
                    family = %self.family,
                    remaining = pending.len(),
                    patience,
                    "patience exhausted; leaving documents pending"
                );
                break;
            }

            passes += 1;
            tracing::info!(family = %self.family, pass = passes, pending = pending.len(), "summarize pass");
            let report = self.run_batch().await?;
            tracing::info!(
                family = %self.family,
                pass = passes,
                recorded = report.recorded,
                rejected = report.rejected,
                failed = report.failed,
                "summarize pass done"
            );
        }

        let remaining = list_pending(&self.pending_dir).await?.len();
        Ok(PatienceReport { passes, remaining })
    }

    /// One pass over a snapshot of the pending directory. Per-document
    /// failures are logged and counted; they never abort the pass.
    pub async fn run_batch(&self) -> anyhow::Result<BatchReport> {
        let documents = list_pending(&self.pending_dir).await?;
        let mut report = BatchReport {
            documents: documents.len(),
            ..BatchReport::default()
        };

        let mut join_set = tokio::task::JoinSet::new();
        let mut queue = documents.into_iter();
        let mut next = queue.next();

        while next.is_some() || !join_set.is_empty() {
            while join_set.len() < self.concurrency {
                let Some(document) = next.take() else {
                    break;
                };
                let pipeline = self.clone();
                join_set.spawn(async move {
                    let outcome = pipeline.process_document(&document).await;
                    (document, outcome)
                });
                next = queue.next();
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            match joined {
                Ok((_, Ok(RecordOutcome::Recorded))) => report.recorded += 1,
                Ok((_, Ok(RecordOutcome::Rejected))) => report.rejected += 1,
                Ok((document, Err(err))) => {
                    report.failed += 1;
                    tracing::warn!(
                        document = %document.display(),
                        error = %format!("{err:#}"),
                        "document failed; stays pending"
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    tracing::error!(?err, "document task panicked");
                }
            }
        }

        Ok(report)
    }

    async fn process_document(&self, document: &Path) -> anyhow::Result<RecordOutcome> {
        let reader = Arc::clone(&self.reader);
        let path = document.to_path_buf();
        let family = self.family;
        let text = tokio::task::spawn_blocking(move || {
            crate::extract::extract_section(reader.as_ref(), &path, family)
        })
        .await
        .context("join text extraction")?
        .context("extract text")?;

        if text.trim().is_empty() {
            anyhow::bail!("no text extracted from {}", document.display());
        }
        tracing::debug!(document = %document.display(), chars = text.chars().count(), "extracted text");

        let raw = self.summarizer.summarize(&text).await.context("summarize")?;
        self.recorder.record(document, &raw).await
    }
}

/// Snapshot of the documents waiting in `dir`, sorted by name. A missing
/// directory has nothing pending.
pub async fn list_pending(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("read pending dir: {}", dir.display()));
        }
    };

    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await.context("read pending dir entry")? {
        let path = entry.path();
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}

pub async fn run(args: SummarizeArgs) -> anyhow::Result<PatienceReport> {
    let pending_dir = args
        .pending
        .clone()
        .unwrap_or_else(|| args.family.default_pending_dir());
    let processed_dir = args
        .processed
        .clone()
        .unwrap_or_else(|| args.family.default_processed_dir());
    let output_name = args.output_name.clone().unwrap_or_else(|| {
        args.family
            .output_name_for(chrono::Local::now().date_naive())
    });
    let output_path = args.output_dir.join(output_name);

    let summarizer = SummaryClient::from_args(&args.summary, &args.network)
        .context("build summarization client")?;
    tracing::info!(
        family = %args.family,
        pending = %pending_dir.display(),
        processed = %processed_dir.display(),
        output = %output_path.display(),
        endpoint = summarizer.endpoint(),
        "summarize"
    );

    let recorder = Arc::new(ResultRecorder::new(output_path, processed_dir));
    let pipeline = Pipeline::new(
        args.family,
        pending_dir,
        Arc::new(PdfReader),
        summarizer,
        recorder,
    )
    .with_concurrency(args.concurrency);

    let report = pipeline.run_with_patience(args.patience).await?;
    tracing::info!(
        family = %args.family,
        passes = report.passes,
        remaining = report.remaining,
        "summarize complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::list_pending;

    #[tokio::test]
    async fn lists_only_pdf_files_sorted() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        for name in ["b.pdf", "a.PDF", "c.pdf.crdownload", "notes.txt"] {
            std::fs::write(temp.path().join(name), b"x")?;
        }
        std::fs::create_dir(temp.path().join("dir.pdf"))?;

        let names = list_pending(temp.path())
            .await?
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
        Ok(())
    }

    #[tokio::test]
    async fn missing_pending_dir_is_empty() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        assert!(list_pending(&temp.path().join("absent")).await?.is_empty());
        Ok(())
    }
}
