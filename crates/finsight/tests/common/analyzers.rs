#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use finsight::analyzer::{AnalyzerError, ChatMessage, ChatModel, DocumentAnalyzer};
use finsight::queue::{AnalysisTask, QueueError, TaskQueue};

/// Answers every request with a deterministic string and records calls.
#[derive(Default)]
pub struct StubAnalyzer {
    calls: AtomicUsize,
    seen: Mutex<Vec<(String, PathBuf)>>,
}

impl StubAnalyzer {
    pub fn answer_for(query: &str) -> String {
        format!("Stub analysis for: {}", query)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, PathBuf)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentAnalyzer for StubAnalyzer {
    async fn analyze(&self, query: &str, file_path: &Path) -> Result<String, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((query.to_string(), file_path.to_path_buf()));
        Ok(Self::answer_for(query))
    }
}

/// Always fails with an API error.
pub struct FailingAnalyzer;

#[async_trait]
impl DocumentAnalyzer for FailingAnalyzer {
    async fn analyze(&self, _query: &str, _file_path: &Path) -> Result<String, AnalyzerError> {
        Err(AnalyzerError::Api {
            status: 503,
            body: "model overloaded".to_string(),
        })
    }
}

/// Sleeps before answering, for timeout tests.
pub struct SlowAnalyzer(pub Duration);

#[async_trait]
impl DocumentAnalyzer for SlowAnalyzer {
    async fn analyze(&self, _query: &str, _file_path: &Path) -> Result<String, AnalyzerError> {
        tokio::time::sleep(self.0).await;
        Ok("late".to_string())
    }
}

/// Chat model that replies with the first line of the system prompt and
/// keeps every conversation for inspection.
#[derive(Default)]
pub struct ScriptedChatModel {
    pub conversations: Mutex<Vec<Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AnalyzerError> {
        self.conversations.lock().unwrap().push(messages.to_vec());
        let first_line = messages
            .first()
            .and_then(|m| m.content.lines().next())
            .unwrap_or_default();
        Ok(format!("reply from [{}]", first_line))
    }
}

/// A broker that refuses every publish.
pub struct UnreachableQueue;

#[async_trait]
impl TaskQueue for UnreachableQueue {
    async fn enqueue(&self, _task: &AnalysisTask) -> Result<(), QueueError> {
        Err(QueueError::Closed)
    }

    async fn dequeue(&self, _wait: Duration) -> Result<Option<AnalysisTask>, QueueError> {
        Err(QueueError::Closed)
    }

    fn describe(&self) -> String {
        "unreachable".to_string()
    }
}
