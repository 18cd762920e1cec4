use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::job_repo::JobRow;
use crate::db::DatabaseError;

/// Identifier of an analysis job. Generated at submission, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a client-supplied id; anything that is not a UUID is `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value.trim()).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Status only moves forward: pending, processing, then done or failed.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Done)
                | (Self::Processing, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown job status '{}'", value)),
        }
    }
}

/// One analysis request and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub job_id: JobId,
    pub status: JobStatus,
    pub query: String,
    pub filename: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub output_file: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// A fresh `pending` job.
    pub fn pending(job_id: JobId, query: &str, filename: &str) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            query: query.to_string(),
            filename: filename.to_string(),
            result: None,
            error: None,
            output_file: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_row(&self) -> JobRow {
        JobRow {
            job_id: self.job_id.to_string(),
            status: self.status.as_str().to_string(),
            query: self.query.clone(),
            filename: self.filename.clone(),
            result: self.result.clone(),
            error: self.error.clone(),
            output_file: self.output_file.clone(),
            created_at: format_timestamp(self.created_at),
            updated_at: format_timestamp(self.updated_at),
        }
    }
}

impl TryFrom<JobRow> for Job {
    type Error = DatabaseError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| DatabaseError::CorruptRow {
            id: row.job_id.clone(),
            reason,
        };
        let job_id = JobId::from_str(&row.job_id).map_err(|e| corrupt(e.to_string()))?;
        let status = JobStatus::try_from(row.status.as_str()).map_err(corrupt)?;
        let created_at = parse_timestamp(&row.created_at).map_err(corrupt)?;
        let updated_at = parse_timestamp(&row.updated_at).map_err(corrupt)?;

        Ok(Self {
            job_id,
            status,
            query: row.query,
            filename: row.filename,
            result: row.result,
            error: row.error,
            output_file: row.output_file,
            created_at,
            updated_at,
        })
    }
}

/// Fixed-width UTC timestamps so lexical order in SQL matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{}': {}", value, e))
}
