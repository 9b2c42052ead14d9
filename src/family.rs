use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

/// Journal family an alert link belongs to. Drives URL rewriting, reference
/// trimming and the default on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum SourceFamily {
    /// American Chemical Society (pubs.acs.org).
    Acs,
    /// American Physical Society (journals.aps.org).
    Aps,
}

impl SourceFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Acs => "acs",
            Self::Aps => "aps",
        }
    }

    pub fn default_links_file(self) -> PathBuf {
        PathBuf::from(format!("data/{}_email_links.txt", self.as_str()))
    }

    pub fn default_pending_dir(self) -> PathBuf {
        PathBuf::from(format!("data/{}_downloaded_pdfs", self.as_str()))
    }

    pub fn default_processed_dir(self) -> PathBuf {
        PathBuf::from(format!("data/{}_summarized_pdfs", self.as_str()))
    }

    pub fn output_name_for(self, date: chrono::NaiveDate) -> String {
        format!("{}-summary-{}.txt", self.as_str(), date.format("%Y-%m-%d"))
    }
}

impl fmt::Display for SourceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
