pub mod analyzer;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod jobs;
pub mod logging;
pub mod processor;
pub mod queue;
pub mod sanitize;
pub mod secrets;
pub mod worker;

pub use analyzer::{CrewAnalyzer, DocumentAnalyzer};
pub use config::{load_settings, Settings};
pub use db::Database;
pub use error::{ConfigError, FinsightError, ProcessError, Result, StorageError, WorkerError};
pub use jobs::{DocumentUpload, Job, JobError, JobId, JobManager, JobStatus};
pub use queue::{AnalysisTask, TaskQueue};
pub use secrets::{resolve_secret, resolve_secret_optional, resolve_secret_with, SecretError};
pub use worker::{WorkerConfig, WorkerPool};
