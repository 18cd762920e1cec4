//! Document analysis: keyword routing over a crew of LLM agents.
//!
//! [`DocumentAnalyzer`] is the seam the job manager depends on. The
//! production implementation is [`CrewAnalyzer`], which reads the PDF once
//! and runs the routed agents in order against an Azure OpenAI deployment.

pub mod agents;
pub mod crew;
pub mod llm;
pub mod routing;
pub mod search;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ProcessError;

pub use crew::{CrewAnalyzer, CrewReport, StepOutput};
pub use llm::{AzureOpenAiClient, ChatMessage, ChatModel};
pub use routing::{route, Capability};
pub use search::{SearchHit, SerperClient, WebSearch};

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("LLM response could not be parsed: {0}")]
    Parse(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("Document could not be read: {0}")]
    Document(#[from] ProcessError),

    #[error("Analysis timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Analysis task failed: {0}")]
    Task(String),
}

/// Produces analysis text for a document and a free-form query.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, query: &str, file_path: &Path) -> Result<String, AnalyzerError>;
}

/// Returns the trimmed query, or the default one when blank.
pub fn normalize_query(query: Option<&str>) -> String {
    match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => crate::config::DEFAULT_QUERY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query(Some("  risk?  ")), "risk?");
        assert_eq!(normalize_query(Some("   ")), crate::config::DEFAULT_QUERY);
        assert_eq!(normalize_query(None), crate::config::DEFAULT_QUERY);
    }

    #[test]
    fn test_timeout_message() {
        let err = AnalyzerError::Timeout(Duration::from_secs(600));
        assert_eq!(err.to_string(), "Analysis timed out after 600 seconds");
    }
}
