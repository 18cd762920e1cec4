//! Job repository: CRUD and state transitions for the `analysis_jobs` table.
//!
//! Every transition is one conditional `UPDATE`, so a row is never observed
//! half-written and a terminal status can never be overwritten.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub job_id: String,
    pub status: String,
    pub query: String,
    pub filename: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub output_file: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            job_id: row.get("job_id")?,
            status: row.get("status")?,
            query: row.get("query")?,
            filename: row.get("filename")?,
            result: row.get("result")?,
            error: row.get("error")?,
            output_file: row.get("output_file")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO analysis_jobs (job_id, status, query, filename, result, error,
             output_file, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.job_id,
                job.status,
                job.query,
                job.filename,
                job.result,
                job.error,
                job.output_file,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, job_id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM analysis_jobs WHERE job_id = ?1")?;
        let mut rows = stmt.query_map(params![job_id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all jobs, newest first. Insertion order breaks timestamp ties.
pub fn list_all(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM analysis_jobs ORDER BY created_at DESC, rowid DESC")?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// `pending -> processing`. Returns `false` if the job was not pending.
pub fn mark_processing(
    db: &Database,
    job_id: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET status = 'processing', updated_at = ?2
             WHERE job_id = ?1 AND status = 'pending'",
            params![job_id, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Refreshes `updated_at` of a job that is still `processing`.
///
/// Returns `false` if the job is missing or no longer processing.
pub fn touch_processing(
    db: &Database,
    job_id: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET updated_at = ?2
             WHERE job_id = ?1 AND status = 'processing'",
            params![job_id, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// `processing -> done`, together with the result and artifact path.
///
/// Returns `false` if the job is missing or not processing.
pub fn mark_done(
    db: &Database,
    job_id: &str,
    result: &str,
    output_file: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs
             SET status = 'done', result = ?2, error = NULL, output_file = ?3, updated_at = ?4
             WHERE job_id = ?1 AND status = 'processing'",
            params![job_id, result, output_file, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// `processing -> failed`, together with the error message.
///
/// Returns `false` if the job is missing or not processing.
pub fn mark_failed(
    db: &Database,
    job_id: &str,
    error: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs
             SET status = 'failed', error = ?2, result = NULL, output_file = NULL, updated_at = ?3
             WHERE job_id = ?1 AND status = 'processing'",
            params![job_id, error, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Fails every `processing` job last touched before `cutoff`.
pub fn fail_stale(
    db: &Database,
    cutoff: &str,
    error: &str,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET status = 'failed', error = ?2, updated_at = ?3
             WHERE status = 'processing' AND updated_at < ?1",
            params![cutoff, error, updated_at],
        )?;
        Ok(changed)
    })
}

/// Deletes a job record. Returns `false` if it did not exist.
pub fn delete(db: &Database, job_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "DELETE FROM analysis_jobs WHERE job_id = ?1",
            params![job_id],
        )?;
        Ok(changed == 1)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM analysis_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
