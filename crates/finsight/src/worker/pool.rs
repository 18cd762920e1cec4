use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::error::WorkerError;
use crate::jobs::{JobManager, RunOutcome};
use crate::queue::{QueueError, TaskQueue};

/// Tuning for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub worker_count: usize,
    /// How long one dequeue waits before the shutdown flag is re-checked.
    pub poll_interval: Duration,
    /// Enables the stale-job reaper when set.
    pub stale_job_age: Option<Duration>,
}

impl WorkerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            worker_count: settings.worker_count,
            stale_job_age: settings.stale_job_age(),
            ..Self::default()
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            poll_interval: Duration::from_secs(1),
            stale_job_age: None,
        }
    }
}

/// Competing consumers on the task queue, each running one job at a time.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    reaper: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub async fn start(manager: Arc<JobManager>, config: WorkerConfig) -> Result<Self, WorkerError> {
        if config.worker_count == 0 {
            return Err(WorkerError::NoWorkers);
        }

        match manager.status_counts().await {
            Ok(counts) => {
                let summary = counts
                    .iter()
                    .map(|(status, n)| format!("{} {}", n, status))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!("Job store: {}", summary);
            }
            Err(e) => warn!("Could not read job counts: {}", e),
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let queue = manager.queue();

        // Tasks a previous run took but never acknowledged.
        match queue.recover().await {
            Ok(0) => {}
            Ok(n) => info!("Requeued {} unacknowledged tasks", n),
            Err(e) => warn!("Could not requeue unacknowledged tasks: {}", e),
        }

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            workers.push(tokio::spawn(run_worker(
                worker_id,
                Arc::clone(&manager),
                Arc::clone(&queue),
                Arc::clone(&shutdown),
                config.poll_interval,
            )));
        }

        let reaper = config.stale_job_age.map(|max_age| {
            tokio::spawn(run_reaper(
                Arc::clone(&manager),
                Arc::clone(&shutdown),
                max_age,
                config.poll_interval,
            ))
        });

        info!(
            "Started {} workers on queue {}",
            config.worker_count,
            queue.describe()
        );

        Ok(Self {
            workers,
            reaper,
            shutdown,
        })
    }

    /// Asks every worker to stop after its current job.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Waits for all workers to exit. Reports the first worker that panicked.
    pub async fn wait(self) -> Result<(), WorkerError> {
        let mut first_panic = None;

        for (i, worker) in self.workers.into_iter().enumerate() {
            match worker.await {
                Ok(()) => debug!("Worker {} finished", i),
                Err(e) => {
                    error!("Worker {} panicked: {:?}", i, e);
                    first_panic.get_or_insert(i);
                }
            }
        }
        if let Some(reaper) = self.reaper {
            if let Err(e) = reaper.await {
                error!("Stale job reaper panicked: {:?}", e);
            }
        }

        info!("All workers have stopped");
        match first_panic {
            Some(worker_id) => Err(WorkerError::Panicked { worker_id }),
            None => Ok(()),
        }
    }
}

async fn run_worker(
    worker_id: usize,
    manager: Arc<JobManager>,
    queue: Arc<dyn TaskQueue>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    debug!("Worker {} started", worker_id);

    // The flag is only checked between dequeues; abandoning an in-flight
    // dequeue could drop a task the broker already handed over.
    while !shutdown.load(Ordering::Relaxed) {
        match queue.dequeue(poll_interval).await {
            Ok(Some(task)) => {
                debug!("Worker {} picked up job {}", worker_id, task.job_id);
                let outcome = manager.run(&task).await;
                match &outcome {
                    RunOutcome::Done => info!("Worker {} finished job {}", worker_id, task.job_id),
                    RunOutcome::Failed(reason) => {
                        warn!("Worker {} failed job {}: {}", worker_id, task.job_id, reason)
                    }
                    RunOutcome::AlreadyFinished(status) => debug!(
                        "Worker {} skipped job {} ({})",
                        worker_id, task.job_id, status
                    ),
                    RunOutcome::Missing => {
                        warn!("Worker {} dropped task for unknown job {}", worker_id, task.job_id)
                    }
                    RunOutcome::StoreError(e) => {
                        error!("Worker {} could not update job {}: {}", worker_id, task.job_id, e)
                    }
                }
                // Left unacknowledged, the task is redelivered after a restart.
                if !matches!(outcome, RunOutcome::StoreError(_)) {
                    if let Err(e) = queue.ack(&task).await {
                        warn!("Worker {} could not acknowledge job {}: {}", worker_id, task.job_id, e);
                    }
                }
            }
            Ok(None) => continue,
            Err(QueueError::Closed) => {
                debug!("Worker {} queue closed", worker_id);
                break;
            }
            Err(e) => {
                error!("Worker {} dequeue failed: {}", worker_id, e);
                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

async fn run_reaper(
    manager: Arc<JobManager>,
    shutdown: Arc<AtomicBool>,
    max_age: Duration,
    tick: Duration,
) {
    let max_age = max_age.max(manager.min_stale_age());
    info!("Stale job reaper failing processing jobs older than {:?}", max_age);
    let period = (max_age / 2).max(tick).min(Duration::from_secs(60));
    let mut next_sweep = tokio::time::Instant::now();

    while !shutdown.load(Ordering::Relaxed) {
        if tokio::time::Instant::now() >= next_sweep {
            if let Err(e) = manager.fail_stale(max_age).await {
                error!("Stale job sweep failed: {}", e);
            }
            next_sweep = tokio::time::Instant::now() + period;
        }
        tokio::time::sleep(tick).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AnalyzerError, DocumentAnalyzer};
    use crate::db::Database;
    use crate::jobs::{ArtifactStore, DocumentUpload, JobId, JobStatus, JobStore};
    use crate::queue::{AnalysisTask, InMemoryQueue};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory queue that records acknowledgements and recoveries.
    #[derive(Default)]
    struct RecordingQueue {
        inner: InMemoryQueue,
        acked: Mutex<Vec<String>>,
        recoveries: AtomicUsize,
    }

    #[async_trait]
    impl TaskQueue for RecordingQueue {
        async fn enqueue(&self, task: &AnalysisTask) -> Result<(), QueueError> {
            self.inner.enqueue(task).await
        }

        async fn dequeue(&self, wait: Duration) -> Result<Option<AnalysisTask>, QueueError> {
            self.inner.dequeue(wait).await
        }

        async fn ack(&self, task: &AnalysisTask) -> Result<(), QueueError> {
            self.acked.lock().unwrap().push(task.job_id.clone());
            Ok(())
        }

        async fn recover(&self) -> Result<usize, QueueError> {
            self.recoveries.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }

        fn describe(&self) -> String {
            "recording".to_string()
        }
    }

    struct QuickAnalyzer;

    #[async_trait]
    impl DocumentAnalyzer for QuickAnalyzer {
        async fn analyze(&self, query: &str, _file_path: &Path) -> Result<String, AnalyzerError> {
            Ok(format!("ok: {}", query))
        }
    }

    fn manager(dir: &TempDir) -> Arc<JobManager> {
        Arc::new(JobManager::new(
            JobStore::new(Database::open_in_memory().unwrap()),
            Arc::new(InMemoryQueue::new()),
            Arc::new(QuickAnalyzer),
            ArtifactStore::new(dir.path().join("data"), dir.path().join("outputs")),
        ))
    }

    fn config(workers: usize) -> WorkerConfig {
        WorkerConfig {
            worker_count: workers,
            poll_interval: Duration::from_millis(50),
            stale_job_age: None,
        }
    }

    #[tokio::test]
    async fn test_rejects_zero_workers() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            WorkerPool::start(manager(&dir), config(0)).await,
            Err(WorkerError::NoWorkers)
        ));
    }

    #[tokio::test]
    async fn test_pool_start_and_shutdown() {
        let dir = TempDir::new().unwrap();
        let pool = WorkerPool::start(manager(&dir), config(2)).await.unwrap();
        assert_eq!(pool.worker_count(), 2);
        assert!(!pool.is_shutdown());

        pool.shutdown();
        assert!(pool.is_shutdown());
        tokio::time::timeout(Duration::from_secs(5), pool.wait())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_processes_submitted_jobs() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let pool = WorkerPool::start(Arc::clone(&manager), config(3))
            .await
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..5 {
            let id = manager
                .submit(
                    DocumentUpload::new(format!("doc{}.pdf", i), b"%PDF".to_vec()),
                    Some("summary"),
                )
                .await
                .unwrap();
            ids.push(id);
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let jobs = manager.list().await.unwrap();
            if jobs.iter().all(|j| j.status == JobStatus::Done) {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "jobs did not finish");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        for id in ids {
            let job = manager.get(&id.to_string()).await.unwrap();
            assert_eq!(job.result.as_deref(), Some("ok: summary"));
        }

        pool.shutdown();
        pool.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_workers_acknowledge_handled_tasks() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(RecordingQueue::default());
        let manager = Arc::new(JobManager::new(
            JobStore::new(Database::open_in_memory().unwrap()),
            queue.clone(),
            Arc::new(QuickAnalyzer),
            ArtifactStore::new(dir.path().join("data"), dir.path().join("outputs")),
        ));

        let pool = WorkerPool::start(Arc::clone(&manager), config(1))
            .await
            .unwrap();
        assert_eq!(queue.recoveries.load(Ordering::SeqCst), 1);

        let id = manager
            .submit(DocumentUpload::new("a.pdf", b"%PDF".to_vec()), None)
            .await
            .unwrap();
        // A task for a deleted job can never succeed, so it is acknowledged too.
        let orphan = JobId::new().to_string();
        queue
            .enqueue(&AnalysisTask {
                job_id: orphan.clone(),
                query: "q".to_string(),
                file_path: dir.path().join("gone.pdf"),
            })
            .await
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while queue.acked.lock().unwrap().len() < 2 {
            assert!(tokio::time::Instant::now() < deadline, "tasks were not acknowledged");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(*queue.acked.lock().unwrap(), vec![id.to_string(), orphan]);

        pool.shutdown();
        pool.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_reaper_fails_stuck_jobs() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(
            JobManager::new(
                JobStore::new(Database::open_in_memory().unwrap()),
                Arc::new(InMemoryQueue::new()),
                Arc::new(QuickAnalyzer),
                ArtifactStore::new(dir.path().join("data"), dir.path().join("outputs")),
            )
            .with_analysis_timeout(Duration::from_millis(20))
            .with_stale_grace(Duration::ZERO),
        );

        // A job some crashed worker left behind.
        let id = manager
            .submit(DocumentUpload::new("stuck.pdf", b"%PDF".to_vec()), None)
            .await
            .unwrap();
        let _ = manager.queue().dequeue(Duration::from_millis(10)).await;
        manager.store().mark_processing(id).await.unwrap();

        let pool = WorkerPool::start(
            Arc::clone(&manager),
            WorkerConfig {
                stale_job_age: Some(Duration::from_millis(1)),
                ..config(1)
            },
        )
        .await
        .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let job = manager.get(&id.to_string()).await.unwrap();
            if job.status == JobStatus::Failed {
                assert!(job.error.unwrap().contains("presumed lost"));
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "job was not reaped");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        pool.shutdown();
        pool.wait().await.unwrap();
    }
}
