pub mod pdf;

use std::path::Path;

use crate::error::ProcessError;

pub use pdf::{PdfProcessor, NO_TEXT_EXTRACTED};

/// Document formats the analyzer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    /// Detects the format from a file name's extension, case-insensitively.
    pub fn from_filename(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
        }
    }
}

/// Text pulled out of a document, ready for the analyzer.
#[derive(Debug, Clone)]
pub struct ProcessedContent {
    pub text: String,
    pub page_count: usize,
    pub format: DocumentFormat,
}

/// Checks that `filename` names a supported document, returning its format.
pub fn validate_filename(filename: &str) -> Result<DocumentFormat, ProcessError> {
    DocumentFormat::from_filename(filename).ok_or_else(|| {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        ProcessError::UnsupportedFormat(ext.to_string())
    })
}

/// Extracts text from the document at `path`, dispatching on its extension.
pub fn extract(path: &Path) -> Result<ProcessedContent, ProcessError> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    match validate_filename(name)? {
        DocumentFormat::Pdf => PdfProcessor::new().process(path),
    }
}
