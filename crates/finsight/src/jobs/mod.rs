//! Analysis job lifecycle: submit, queue, run, persist, poll, delete.

pub mod artifacts;
pub mod job;
pub mod manager;
pub mod store;

use thiserror::Error;

use crate::analyzer::AnalyzerError;
use crate::db::DatabaseError;
use crate::error::StorageError;
use crate::queue::QueueError;

pub use artifacts::{ArtifactStore, StagedFile};
pub use job::{Job, JobId, JobStatus};
pub use manager::{JobManager, RunOutcome, SyncAnalysis};
pub use store::JobStore;

pub const ONLY_PDF_SUPPORTED: &str = "Only PDF files are supported.";
pub const JOB_NOT_FOUND: &str = "Job not found.";
pub const NO_DOCUMENT_IN_DATA_DIR: &str =
    "No PDF found in data folder. Add a PDF to data/ or upload via /analyze.";

/// A document received from a client.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    /// Client-supplied name, kept for display only.
    pub filename: String,
    pub content: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// Service-level failures, one variant per way a caller can be turned away.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{}", JOB_NOT_FOUND)]
    NotFound,

    #[error("{}", NO_DOCUMENT_IN_DATA_DIR)]
    NoDocument,

    #[error("Analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Task queue unavailable: {0}")]
    Queue(#[from] QueueError),

    #[error("Job store unavailable: {0}")]
    Store(#[from] DatabaseError),

    #[error("File storage failed: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_facing_messages() {
        assert_eq!(JobError::NotFound.to_string(), "Job not found.");
        assert_eq!(
            JobError::InvalidInput(ONLY_PDF_SUPPORTED.to_string()).to_string(),
            "Only PDF files are supported."
        );
        assert!(JobError::NoDocument.to_string().starts_with("No PDF found"));
    }
}
