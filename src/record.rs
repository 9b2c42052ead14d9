use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use tokio::io::AsyncWriteExt as _;
use tokio::sync::Mutex;

/// Line closing every record in the output file.
pub fn record_separator() -> String {
    format!("#{}#", "-".repeat(120))
}

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Returns the summary text if `raw` is a chat-completions envelope whose
/// first choice has non-empty content.
pub fn validate_response(raw: &str) -> Option<String> {
    let envelope: ChatEnvelope = serde_json::from_str(raw).ok()?;
    let content = envelope.choices.into_iter().next()?.message.content?;
    if content.trim().is_empty() {
        return None;
    }
    Some(content)
}

pub fn format_record(document_name: &str, summary: &str) -> String {
    format!(
        "Summary of {document_name}\n\n{summary}\n\n{}\n",
        record_separator()
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Summary appended and document moved to the processed directory.
    Recorded,
    /// Response failed validation; nothing was written or moved.
    Rejected,
}

/// Appends validated summaries to one shared output file. Appends are
/// serialized; the document move afterwards is not.
#[derive(Debug)]
pub struct ResultRecorder {
    output_path: PathBuf,
    processed_dir: PathBuf,
    append_lock: Mutex<()>,
}

impl ResultRecorder {
    pub fn new(output_path: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            processed_dir: processed_dir.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub async fn record(&self, document: &Path, raw_response: &str) -> anyhow::Result<RecordOutcome> {
        let document_name = document
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("document path has no file name: {}", document.display()))?;

        let Some(summary) = validate_response(raw_response) else {
            tracing::warn!(
                document = %document_name,
                response = %raw_response,
                "summary response rejected; document stays pending"
            );
            return Ok(RecordOutcome::Rejected);
        };

        self.append(&format_record(&document_name, &summary))
            .await
            .with_context(|| format!("append summary for {document_name}"))?;
        tracing::info!(document = %document_name, output = %self.output_path.display(), "summary written");

        move_into_dir(document, &self.processed_dir)
            .await
            .with_context(|| format!("move {document_name} to processed dir"))?;
        Ok(RecordOutcome::Recorded)
    }

    async fn append(&self, block: &str) -> anyhow::Result<()> {
        let _guard = self.append_lock.lock().await;

        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create output dir: {}", parent.display()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output_path)
            .await
            .with_context(|| format!("open output: {}", self.output_path.display()))?;
        file.write_all(block.as_bytes())
            .await
            .with_context(|| format!("write output: {}", self.output_path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flush output: {}", self.output_path.display()))?;
        Ok(())
    }
}

/// Moves `file` into `dir`, creating `dir` first. Falls back to copy and
/// remove when a rename cannot cross filesystems.
pub async fn move_into_dir(file: &Path, dir: &Path) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("create dir: {}", dir.display()))?;
    let name = file
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", file.display()))?;
    let target = dir.join(name);

    if tokio::fs::rename(file, &target).await.is_ok() {
        return Ok(target);
    }
    tokio::fs::copy(file, &target)
        .await
        .with_context(|| format!("copy {} to {}", file.display(), target.display()))?;
    tokio::fs::remove_file(file)
        .await
        .with_context(|| format!("remove {}", file.display()))?;
    Ok(target)
}
