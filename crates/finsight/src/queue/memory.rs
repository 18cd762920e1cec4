use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::{AnalysisTask, QueueError, TaskQueue};

/// In-process queue for single-binary deployments and tests.
///
/// Every `dequeue` pulls from the same channel, so concurrent consumers
/// compete for tasks and each task is delivered once.
#[derive(Clone)]
pub struct InMemoryQueue {
    sender: Sender<AnalysisTask>,
    receiver: Receiver<AnalysisTask>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, task: &AnalysisTask) -> Result<(), QueueError> {
        self.sender
            .send(task.clone())
            .map_err(|_| QueueError::Closed)?;
        log::debug!("Queued task for job {}", task.job_id);
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<AnalysisTask>, QueueError> {
        if let Ok(task) = self.receiver.try_recv() {
            return Ok(Some(task));
        }

        let receiver = self.receiver.clone();
        let received = tokio::task::spawn_blocking(move || receiver.recv_timeout(wait))
            .await
            .map_err(|e| QueueError::Task(e.to_string()))?;

        match received {
            Ok(task) => Ok(Some(task)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::Closed),
        }
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
