use std::path::Path;

use anyhow::Context as _;

use crate::family::SourceFamily;

/// Source of per-page text for a fetched document.
pub trait DocumentReader: Send + Sync {
    fn read_pages(&self, path: &Path) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PdfReader;

impl DocumentReader for PdfReader {
    fn read_pages(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        let document = lopdf::Document::load(path)
            .with_context(|| format!("open pdf: {}", path.display()))?;

        let mut pages = Vec::new();
        for page_number in document.get_pages().keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) => pages.push(text),
                Err(err) => {
                    tracing::debug!(
                        path = %path.display(),
                        page = page_number,
                        %err,
                        "page text unavailable"
                    );
                    pages.push(String::new());
                }
            }
        }
        Ok(pages)
    }
}

/// Reads `path` and returns the text ahead of the family's reference section.
pub fn extract_section(
    reader: &dyn DocumentReader,
    path: &Path,
    family: SourceFamily,
) -> anyhow::Result<String> {
    let pages = reader.read_pages(path)?;
    let text = join_pages(&pages);
    Ok(trim_to_section(&text, family).to_owned())
}

/// Concatenates page texts in order, one space after each page, with line
/// breaks flattened to spaces.
pub fn join_pages(pages: &[String]) -> String {
    let mut text = String::with_capacity(pages.iter().map(|p| p.len() + 1).sum());
    for page in pages {
        text.push_str(page);
        text.push(' ');
    }
    text.replace(['\r', '\n'], " ")
}

/// Cuts `text` at the family's boundary marker. When the marker is absent the
/// whole text is kept.
pub fn trim_to_section(text: &str, family: SourceFamily) -> &str {
    let boundary = match family {
        SourceFamily::Acs => text.find("REFERENCES"),
        SourceFamily::Aps => text.rfind("[1]"),
    };
    match boundary {
        Some(idx) => &text[..idx],
        None => text,
    }
}
