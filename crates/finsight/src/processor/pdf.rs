use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{DocumentFormat, ProcessedContent};

/// Placeholder handed to the analyzer when a PDF carries no extractable text.
pub const NO_TEXT_EXTRACTED: &str = "No text could be extracted from the PDF.";

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, path: &Path) -> Result<ProcessedContent, ProcessError> {
        let _span = tracing::info_span!(
            "processor.pdf",
            file = %crate::sanitize::redact_path(path)
        )
        .entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.process_bytes(&pdf_bytes)
    }

    pub fn process_bytes(&self, pdf_bytes: &[u8]) -> Result<ProcessedContent, ProcessError> {
        let doc = lopdf::Document::load_mem(pdf_bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let pages = doc.get_pages();
        let page_count = pages.len();
        let mut text = String::new();

        for (page_num, _) in pages {
            match doc.extract_text(&[page_num]) {
                Ok(page_text) => {
                    text.push_str(&collapse_blank_lines(&page_text));
                    text.push('\n');
                }
                Err(e) => {
                    tracing::debug!(page = page_num, error = %e, "Skipping unreadable page");
                }
            }
        }

        tracing::debug!(pages = page_count, chars = text.len(), "Extracted PDF text");

        Ok(ProcessedContent {
            text,
            page_count,
            format: DocumentFormat::Pdf,
        })
    }
}

/// Collapses runs of blank lines into a single newline.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains("\n\n") {
        out = out.replace("\n\n", "\n");
    }
    out
}
