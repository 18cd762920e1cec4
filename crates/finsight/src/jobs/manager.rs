use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use super::artifacts::ArtifactStore;
use super::job::{Job, JobId, JobStatus};
use super::store::JobStore;
use super::{DocumentUpload, JobError, ONLY_PDF_SUPPORTED};
use crate::analyzer::{normalize_query, AnalyzerError, DocumentAnalyzer};
use crate::config::Settings;
use crate::db::Database;
use crate::error::{FinsightError, StorageError};
use crate::processor;
use crate::queue::{self, AnalysisTask, TaskQueue};
use crate::sanitize::redact_path;

/// What happened when a worker ran one delivered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No job record matches the task.
    Missing,
    /// The job was already terminal; nothing changed.
    AlreadyFinished(JobStatus),
    Done,
    Failed(String),
    /// The store could not be read or written.
    StoreError(String),
}

/// Result of a synchronous analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAnalysis {
    pub query: String,
    pub analysis: String,
    /// Display name of the analyzed document.
    pub file_processed: String,
}

/// Slack past the analysis timeout before a `processing` job counts as lost.
pub const DEFAULT_STALE_GRACE: Duration = Duration::from_secs(30);

/// Owns the job state machine. The API calls `submit`, workers call `run`.
pub struct JobManager {
    store: JobStore,
    queue: Arc<dyn TaskQueue>,
    analyzer: Arc<dyn DocumentAnalyzer>,
    artifacts: ArtifactStore,
    analysis_timeout: Duration,
    stale_grace: Duration,
}

impl JobManager {
    pub fn new(
        store: JobStore,
        queue: Arc<dyn TaskQueue>,
        analyzer: Arc<dyn DocumentAnalyzer>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            store,
            queue,
            analyzer,
            artifacts,
            analysis_timeout: Duration::from_secs(600),
            stale_grace: DEFAULT_STALE_GRACE,
        }
    }

    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    /// Youngest `processing` age the reaper may fail: a worker can still be
    /// inside the analyzer until the timeout fires.
    pub fn min_stale_age(&self) -> Duration {
        self.analysis_timeout + self.stale_grace
    }

    /// Opens the store and queue described by `settings`.
    pub fn from_settings(
        settings: &Settings,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Result<Self, FinsightError> {
        let db = Database::connect(&settings.database_url)?;
        let queue = queue::open(&settings.queue_url, &settings.queue_key)?;
        log::info!("Task queue: {}", queue.describe());

        Ok(Self::new(
            JobStore::new(db),
            queue,
            analyzer,
            ArtifactStore::new(&settings.data_dir, &settings.outputs_dir),
        )
        .with_analysis_timeout(settings.analysis_timeout()))
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn queue(&self) -> Arc<dyn TaskQueue> {
        Arc::clone(&self.queue)
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Accepts a document for background analysis and returns its job id
    /// without waiting for the analyzer.
    pub async fn submit(
        &self,
        upload: DocumentUpload,
        query: Option<&str>,
    ) -> Result<JobId, JobError> {
        validate_upload(&upload.filename)?;
        let query = normalize_query(query);
        let job_id = JobId::new();

        // Until the task is queued the staged file belongs to this call and
        // is removed on every early return, cancellation included.
        let DocumentUpload { filename, content } = upload;
        let staged = self
            .on_artifacts(move |a| a.stage_upload(job_id, &content))
            .await?;

        let job = Job::pending(job_id, &query, &filename);
        self.store.insert(&job).await?;

        let task = AnalysisTask {
            job_id: job_id.to_string(),
            query,
            file_path: staged.path().to_path_buf(),
        };
        if let Err(e) = self.queue.enqueue(&task).await {
            // A job no worker will ever see must not stay visible as pending.
            tracing::error!(job_id = %job_id, error = %e, "Enqueue failed; withdrawing job");
            if let Err(store_err) = self.store.delete(job_id).await {
                tracing::error!(job_id = %job_id, error = %store_err, "Could not withdraw job");
            }
            return Err(e.into());
        }
        let _ = staged.keep();

        tracing::info!(
            job_id = %job_id,
            file = %redact_path(Path::new(&filename)),
            "Job queued"
        );
        Ok(job_id)
    }

    /// Executes one delivered task. Job failures are recorded, never returned.
    pub async fn run(&self, task: &AnalysisTask) -> RunOutcome {
        let Some(job_id) = JobId::parse(&task.job_id) else {
            tracing::warn!(job_id = %task.job_id, "Task carries an invalid job id");
            return RunOutcome::Missing;
        };

        let span = tracing::info_span!("job", job_id = %job_id);
        self.run_job(job_id, task).instrument(span).await
    }

    async fn run_job(&self, job_id: JobId, task: &AnalysisTask) -> RunOutcome {
        let job = match self.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!("Job not found; dropping task");
                return RunOutcome::Missing;
            }
            Err(e) => return store_error(e),
        };

        if job.status.is_terminal() {
            tracing::info!(status = %job.status, "Job already finished; ignoring redelivery");
            return RunOutcome::AlreadyFinished(job.status);
        }

        if job.status == JobStatus::Pending {
            match self.store.mark_processing(job_id).await {
                Ok(true) => {}
                // Lost the race to a concurrent delivery; re-check where it went.
                Ok(false) => match self.store.get(job_id).await {
                    Ok(Some(current)) if current.status.is_terminal() => {
                        return RunOutcome::AlreadyFinished(current.status)
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => return RunOutcome::Missing,
                    Err(e) => return store_error(e),
                },
                Err(e) => return store_error(e),
            }
        } else {
            tracing::info!("Re-executing job left in processing");
            // Restart the stale clock so the reaper sees this run as live.
            match self.store.touch_processing(job_id).await {
                Ok(true) => {}
                Ok(false) => return self.finished_elsewhere(job_id).await,
                Err(e) => return store_error(e),
            }
        }

        let started = std::time::Instant::now();
        let analysis = tokio::time::timeout(
            self.analysis_timeout,
            self.analyzer.analyze(&job.query, &task.file_path),
        )
        .await
        .unwrap_or_else(|_| Err(AnalyzerError::Timeout(self.analysis_timeout)));

        let text = match analysis {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Analysis failed");
                return self.fail(job_id, e.to_string()).await;
            }
        };

        let result_text = text.clone();
        let output_file = match self
            .on_artifacts(move |a| a.write_result(job_id, &result_text))
            .await
        {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(error = %e, "Could not persist result artifact");
                return self
                    .fail(job_id, format!("Could not persist result: {}", e))
                    .await;
            }
        };

        match self
            .store
            .mark_done(job_id, &text, &output_file.to_string_lossy())
            .await
        {
            Ok(true) => {
                self.artifacts.remove_staged(&task.file_path);
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    output = %redact_path(&output_file),
                    "Job done"
                );
                RunOutcome::Done
            }
            Ok(false) => {
                let outcome = self.finished_elsewhere(job_id).await;
                if outcome != RunOutcome::AlreadyFinished(JobStatus::Done) {
                    self.artifacts.remove_result(job_id);
                }
                outcome
            }
            Err(e) => store_error(e),
        }
    }

    async fn fail(&self, job_id: JobId, message: String) -> RunOutcome {
        match self.store.mark_failed(job_id, &message).await {
            Ok(true) => RunOutcome::Failed(message),
            Ok(false) => self.finished_elsewhere(job_id).await,
            Err(e) => store_error(e),
        }
    }

    async fn finished_elsewhere(&self, job_id: JobId) -> RunOutcome {
        match self.store.get(job_id).await {
            Ok(Some(job)) => RunOutcome::AlreadyFinished(job.status),
            Ok(None) => RunOutcome::Missing,
            Err(e) => store_error(e),
        }
    }

    /// Looks up a job. Ids that are not UUIDs are simply not found.
    pub async fn get(&self, job_id: &str) -> Result<Job, JobError> {
        let id = JobId::parse(job_id).ok_or(JobError::NotFound)?;
        self.store.get(id).await?.ok_or(JobError::NotFound)
    }

    /// Every job, newest first.
    pub async fn list(&self) -> Result<Vec<Job>, JobError> {
        Ok(self.store.list().await?)
    }

    /// Removes the record only; the result artifact stays on disk.
    pub async fn delete(&self, job_id: &str) -> Result<JobId, JobError> {
        let id = JobId::parse(job_id).ok_or(JobError::NotFound)?;
        if self.store.delete(id).await? {
            tracing::info!(job_id = %id, "Job deleted");
            Ok(id)
        } else {
            Err(JobError::NotFound)
        }
    }

    /// Analyzes an upload inline. No job record is created and the staged
    /// copy is always removed.
    pub async fn analyze_now(
        &self,
        upload: DocumentUpload,
        query: Option<&str>,
    ) -> Result<SyncAnalysis, JobError> {
        validate_upload(&upload.filename)?;
        let query = normalize_query(query);

        let DocumentUpload { filename, content } = upload;
        let staged = self
            .on_artifacts(move |a| a.stage_sync_upload(&content))
            .await?;

        let analysis = self.analyze_with_timeout(&query, staged.path()).await?;
        drop(staged);

        Ok(SyncAnalysis {
            query,
            analysis,
            file_processed: filename,
        })
    }

    /// Analyzes the first PDF found in the data directory.
    pub async fn analyze_data_folder(&self, query: Option<&str>) -> Result<SyncAnalysis, JobError> {
        let query = normalize_query(query);
        let document: PathBuf = self
            .on_artifacts(|a| a.first_document())
            .await?
            .ok_or(JobError::NoDocument)?;

        tracing::info!(file = %redact_path(&document), "Analyzing document from data folder");
        let analysis = self.analyze_with_timeout(&query, &document).await?;

        Ok(SyncAnalysis {
            query,
            analysis,
            file_processed: redact_path(&document),
        })
    }

    /// Fails jobs stuck in `processing` for longer than `max_age`, never
    /// less than [`JobManager::min_stale_age`].
    pub async fn fail_stale(&self, max_age: Duration) -> Result<usize, JobError> {
        let max_age = max_age.max(self.min_stale_age());
        let message = format!(
            "Job did not finish within {:?} of its last update; presumed lost",
            max_age
        );
        let failed = self.store.fail_stale(max_age, &message).await?;
        if failed > 0 {
            tracing::warn!(count = failed, "Failed stale processing jobs");
        }
        Ok(failed)
    }

    /// Job counts per status, for startup logging.
    pub async fn status_counts(&self) -> Result<Vec<(JobStatus, u64)>, JobError> {
        let mut counts = Vec::with_capacity(4);
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Done,
            JobStatus::Failed,
        ] {
            counts.push((status, self.store.count(status).await?));
        }
        Ok(counts)
    }

    async fn analyze_with_timeout(&self, query: &str, path: &Path) -> Result<String, JobError> {
        tokio::time::timeout(self.analysis_timeout, self.analyzer.analyze(query, path))
            .await
            .unwrap_or_else(|_| Err(AnalyzerError::Timeout(self.analysis_timeout)))
            .map_err(JobError::from)
    }

    async fn on_artifacts<F, T>(&self, f: F) -> Result<T, JobError>
    where
        F: FnOnce(&ArtifactStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let artifacts = self.artifacts.clone();
        let result = tokio::task::spawn_blocking(move || f(&artifacts))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?;
        Ok(result?)
    }
}

fn validate_upload(filename: &str) -> Result<(), JobError> {
    processor::validate_filename(filename)
        .map(|_| ())
        .map_err(|_| JobError::InvalidInput(ONLY_PDF_SUPPORTED.to_string()))
}

fn store_error(e: crate::db::DatabaseError) -> RunOutcome {
    tracing::error!(error = %e, "Job store error");
    RunOutcome::StoreError(e.to_string())
}
