//! Async facade over the synchronous job repository.
//!
//! Each call hops onto the blocking pool so SQLite never stalls the runtime.

use std::time::Duration;

use chrono::Utc;

use super::job::{format_timestamp, Job, JobId, JobStatus};
use crate::db::{job_repo, Database, DatabaseError};

#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Database) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DatabaseError::Task(e.to_string()))?
    }

    pub async fn insert(&self, job: &Job) -> Result<(), DatabaseError> {
        let row = job.to_row();
        self.run_blocking(move |db| job_repo::insert(db, &row)).await
    }

    pub async fn get(&self, id: JobId) -> Result<Option<Job>, DatabaseError> {
        let key = id.to_string();
        let row = self
            .run_blocking(move |db| job_repo::find_by_id(db, &key))
            .await?;
        row.map(Job::try_from).transpose()
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Result<Vec<Job>, DatabaseError> {
        let rows = self.run_blocking(job_repo::list_all).await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    pub async fn mark_processing(&self, id: JobId) -> Result<bool, DatabaseError> {
        let key = id.to_string();
        let now = format_timestamp(Utc::now());
        self.run_blocking(move |db| job_repo::mark_processing(db, &key, &now))
            .await
    }

    pub async fn touch_processing(&self, id: JobId) -> Result<bool, DatabaseError> {
        let key = id.to_string();
        let now = format_timestamp(Utc::now());
        self.run_blocking(move |db| job_repo::touch_processing(db, &key, &now))
            .await
    }

    pub async fn mark_done(
        &self,
        id: JobId,
        result: &str,
        output_file: &str,
    ) -> Result<bool, DatabaseError> {
        let key = id.to_string();
        let result = result.to_string();
        let output_file = output_file.to_string();
        let now = format_timestamp(Utc::now());
        self.run_blocking(move |db| job_repo::mark_done(db, &key, &result, &output_file, &now))
            .await
    }

    pub async fn mark_failed(&self, id: JobId, error: &str) -> Result<bool, DatabaseError> {
        let key = id.to_string();
        let error = error.to_string();
        let now = format_timestamp(Utc::now());
        self.run_blocking(move |db| job_repo::mark_failed(db, &key, &error, &now))
            .await
    }

    /// Fails `processing` jobs untouched for longer than `max_age`.
    pub async fn fail_stale(&self, max_age: Duration, error: &str) -> Result<usize, DatabaseError> {
        let now = Utc::now();
        let age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = now
            .checked_sub_signed(age)
            .map(format_timestamp)
            .unwrap_or_default();
        let now = format_timestamp(now);
        let error = error.to_string();
        self.run_blocking(move |db| job_repo::fail_stale(db, &cutoff, &error, &now))
            .await
    }

    pub async fn delete(&self, id: JobId) -> Result<bool, DatabaseError> {
        let key = id.to_string();
        self.run_blocking(move |db| job_repo::delete(db, &key)).await
    }

    pub async fn count(&self, status: JobStatus) -> Result<u64, DatabaseError> {
        self.run_blocking(move |db| job_repo::count_by_status(db, status.as_str()))
            .await
    }
}
