//! Isolated job-service environment for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tempfile::TempDir;

use finsight::analyzer::DocumentAnalyzer;
use finsight::db::Database;
use finsight::jobs::{ArtifactStore, JobManager, JobStore, RunOutcome};
use finsight::queue::{AnalysisTask, InMemoryQueue, TaskQueue};

use super::analyzers::StubAnalyzer;

pub struct TestHarness {
    temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub outputs_dir: PathBuf,
    pub queue: InMemoryQueue,
    pub manager: Arc<JobManager>,
}

impl TestHarness {
    /// Harness backed by a [`StubAnalyzer`].
    pub fn new() -> (Self, Arc<StubAnalyzer>) {
        let analyzer = Arc::new(StubAnalyzer::default());
        (Self::with_analyzer(analyzer.clone()), analyzer)
    }

    pub fn with_analyzer(analyzer: Arc<dyn DocumentAnalyzer>) -> Self {
        let queue = InMemoryQueue::new();
        Self::build(analyzer, Arc::new(queue.clone()), queue, Duration::from_secs(30))
    }

    pub fn with_timeout(analyzer: Arc<dyn DocumentAnalyzer>, timeout: Duration) -> Self {
        let queue = InMemoryQueue::new();
        Self::build(analyzer, Arc::new(queue.clone()), queue, timeout)
    }

    /// Harness whose manager publishes to `broker` instead of the local queue.
    pub fn with_broker(analyzer: Arc<dyn DocumentAnalyzer>, broker: Arc<dyn TaskQueue>) -> Self {
        Self::build(analyzer, broker, InMemoryQueue::new(), Duration::from_secs(30))
    }

    fn build(
        analyzer: Arc<dyn DocumentAnalyzer>,
        broker: Arc<dyn TaskQueue>,
        queue: InMemoryQueue,
        timeout: Duration,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let data_dir = temp_dir.path().join("data");
        let outputs_dir = temp_dir.path().join("outputs");

        let db = Database::open_in_memory().expect("Failed to open database");
        let manager = JobManager::new(
            JobStore::new(db),
            broker,
            analyzer,
            ArtifactStore::new(&data_dir, &outputs_dir),
        )
        .with_analysis_timeout(timeout);

        Self {
            temp_dir,
            data_dir,
            outputs_dir,
            queue,
            manager: Arc::new(manager),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn router(&self) -> Router {
        finsight::http::router(Arc::clone(&self.manager))
    }

    /// Places a file directly in the data directory.
    pub fn write_data_file(&self, filename: &str, content: &[u8]) -> PathBuf {
        std::fs::create_dir_all(&self.data_dir).expect("Failed to create data dir");
        let path = self.data_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write data file");
        path
    }

    pub async fn next_task(&self) -> AnalysisTask {
        self.queue
            .dequeue(Duration::from_secs(2))
            .await
            .expect("Queue failed")
            .expect("No task was queued")
    }

    /// Dequeues one task and runs it, like a single worker iteration.
    pub async fn run_next(&self) -> (AnalysisTask, RunOutcome) {
        let task = self.next_task().await;
        let outcome = self.manager.run(&task).await;
        (task, outcome)
    }
}
