//! Task queue between the API and the analysis workers.
//!
//! Each delivered task goes to exactly one consumer. The backend is chosen
//! from the queue URL:
//!
//! - `redis://` and `rediss://` use a Redis list with a processing list
//!   beside it. Delivery is at-least-once: a task stays on the broker until
//!   the worker acknowledges it, and unacknowledged tasks are requeued when
//!   a worker pool starts.
//! - `memory://` uses an in-process channel. Tasks live only as long as the
//!   process, so acknowledgement is a no-op.

pub mod memory;
pub mod redis;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::memory::InMemoryQueue;
pub use self::redis::RedisQueue;

/// Message handed from the API to a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTask {
    pub job_id: String,
    pub query: String,
    /// Absolute path of the staged upload.
    pub file_path: PathBuf,
}

impl AnalysisTask {
    pub fn to_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(QueueError::Encode)
    }

    pub fn from_json(payload: &str) -> Result<Self, QueueError> {
        serde_json::from_str(payload).map_err(QueueError::Decode)
    }
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Unsupported queue URL '{0}': expected redis://, rediss:// or memory://")]
    UnsupportedUrl(String),

    #[error("Broker error: {0}")]
    Broker(#[from] ::redis::RedisError),

    #[error("Failed to encode task: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode task payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Queue is closed")]
    Closed,

    #[error("Queue task failed: {0}")]
    Task(String),
}

/// Queue backends selectable by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    Redis(String),
    Memory,
}

impl QueueBackend {
    pub fn parse(url: &str) -> Result<Self, QueueError> {
        let url = url.trim();
        if url.starts_with("redis://") || url.starts_with("rediss://") {
            Ok(Self::Redis(url.to_string()))
        } else if url == "memory://" || url == "memory" {
            Ok(Self::Memory)
        } else {
            Err(QueueError::UnsupportedUrl(crate::sanitize::redact_url(url)))
        }
    }

    pub fn is_in_process(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publishes a task. Returns only once the broker has accepted it.
    async fn enqueue(&self, task: &AnalysisTask) -> Result<(), QueueError>;

    /// Waits up to `wait` for the next task.
    async fn dequeue(&self, wait: Duration) -> Result<Option<AnalysisTask>, QueueError>;

    /// Marks a delivered task as handled. Until then the broker may hand it
    /// out again.
    async fn ack(&self, _task: &AnalysisTask) -> Result<(), QueueError> {
        Ok(())
    }

    /// Requeues tasks that were delivered but never acknowledged. Returns
    /// how many were moved back.
    async fn recover(&self) -> Result<usize, QueueError> {
        Ok(0)
    }

    /// Short label for logs. Never contains credentials.
    fn describe(&self) -> String;
}

/// Opens the queue named by `url`.
pub fn open(url: &str, key: &str) -> Result<Arc<dyn TaskQueue>, QueueError> {
    match QueueBackend::parse(url)? {
        QueueBackend::Redis(url) => Ok(Arc::new(RedisQueue::new(&url, key)?)),
        QueueBackend::Memory => Ok(Arc::new(InMemoryQueue::new())),
    }
}
