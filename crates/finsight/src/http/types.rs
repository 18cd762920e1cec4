//! Response bodies for the HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::{Job, JobId, JobStatus, SyncAnalysis};

pub const HEALTH_MESSAGE: &str = "Financial Document Analyzer API is running";

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
    pub job_id: JobId,
    pub message: String,
}

impl QueuedResponse {
    pub fn new(job_id: JobId) -> Self {
        Self {
            status: "queued",
            job_id,
            message: format!(
                "Document queued for analysis. Poll GET /result/{} for updates. \
                 Result is also saved to outputs/.",
                job_id
            ),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SyncAnalysisResponse {
    pub status: &'static str,
    pub query: String,
    pub analysis: String,
    pub file_processed: String,
}

impl From<SyncAnalysis> for SyncAnalysisResponse {
    fn from(out: SyncAnalysis) -> Self {
        Self {
            status: "success",
            query: out.query,
            analysis: out.analysis,
            file_processed: out.file_processed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DataFolderResponse {
    pub status: &'static str,
    pub query: String,
    pub analysis: String,
    pub source: &'static str,
}

impl From<SyncAnalysis> for DataFolderResponse {
    fn from(out: SyncAnalysis) -> Self {
        Self {
            status: "success",
            query: out.query,
            analysis: out.analysis,
            source: "data_folder",
        }
    }
}

/// One row of `GET /history`; the full result is only on `GET /result/{id}`.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub job_id: JobId,
    pub status: JobStatus,
    pub query: String,
    pub filename: String,
    pub output_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Job> for HistoryEntry {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            query: job.query,
            filename: job.filename,
            output_file: job.output_file,
            created_at: job.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeDataParams {
    pub query: Option<String>,
}
