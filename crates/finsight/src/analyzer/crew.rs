use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use super::agents::{self, render};
use super::llm::{AzureOpenAiClient, ChatMessage, ChatModel};
use super::routing::{route, Capability};
use super::search::{format_hits, SerperClient, WebSearch};
use super::{normalize_query, AnalyzerError, DocumentAnalyzer};
use crate::config::Settings;
use crate::error::ConfigError;
use crate::processor::{self, NO_TEXT_EXTRACTED};

const TRUNCATION_MARKER: &str = "\n[Document truncated]";

/// Output of one crew member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub capability: Capability,
    pub output: String,
}

/// Everything a crew run produced, in invocation order.
#[derive(Debug, Clone, Default)]
pub struct CrewReport {
    pub steps: Vec<StepOutput>,
}

impl CrewReport {
    /// The answer returned to callers: the last step's output.
    pub fn final_output(&self) -> Option<&str> {
        self.steps.last().map(|s| s.output.as_str())
    }

    fn output_of(&self, capability: Capability) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| s.capability == capability)
            .map(|s| s.output.as_str())
    }
}

/// Runs the routed agents sequentially against one chat model.
///
/// The document is read once and inlined into every step; each step also
/// sees the outputs of the earlier steps it declares as context.
pub struct CrewAnalyzer {
    model: Arc<dyn ChatModel>,
    search: Option<Arc<dyn WebSearch>>,
    max_document_chars: usize,
}

impl CrewAnalyzer {
    pub fn new(model: Arc<dyn ChatModel>, max_document_chars: usize) -> Self {
        Self {
            model,
            search: None,
            max_document_chars: max_document_chars.max(1),
        }
    }

    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Azure-backed crew, with Serper search when a key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let client = AzureOpenAiClient::from_config(&settings.azure, settings.analysis_timeout())?;
        let crew = Self::new(Arc::new(client), settings.max_document_chars);
        Ok(match SerperClient::from_config(&settings.search)? {
            Some(search) => crew.with_search(Arc::new(search)),
            None => crew,
        })
    }

    /// Runs the crew over already-extracted document text.
    pub async fn run(
        &self,
        query: &str,
        file_name: &str,
        document_text: &str,
    ) -> Result<CrewReport, AnalyzerError> {
        let document = self.prepare_document(document_text);
        let capabilities = route(query);
        tracing::info!(
            steps = %capabilities.iter().map(Capability::as_str).collect::<Vec<_>>().join(","),
            "Running analysis crew"
        );

        let mut report = CrewReport::default();
        for capability in capabilities {
            let messages = self
                .build_messages(capability, query, file_name, &document, &report)
                .await;
            let output = self.model.complete(&messages).await?;
            tracing::debug!(step = %capability, chars = output.len(), "Crew step finished");
            report.steps.push(StepOutput { capability, output });
        }
        Ok(report)
    }

    fn prepare_document(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return NO_TEXT_EXTRACTED.to_string();
        }
        match text.char_indices().nth(self.max_document_chars) {
            Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
            None => text.to_string(),
        }
    }

    async fn build_messages(
        &self,
        capability: Capability,
        query: &str,
        file_name: &str,
        document: &str,
        report: &CrewReport,
    ) -> Vec<ChatMessage> {
        let step = agents::step(capability);
        let mut prompt = render(step.description, query, file_name);
        prompt.push_str("\n\nExpected output:\n");
        prompt.push_str(step.expected_output);

        for dep in step.context {
            if let Some(previous) = report.output_of(*dep) {
                prompt.push_str(&format!("\n\nFindings from the {} step:\n{}", dep, previous));
            }
        }

        if capability == Capability::InvestmentAdvice {
            if let Some(results) = self.web_context(query).await {
                prompt.push_str("\n\nRecent web search results (may be incomplete):\n");
                prompt.push_str(&results);
            }
        }

        prompt.push_str(&format!(
            "\n\nDocument '{}':\n<<<\n{}\n>>>",
            file_name, document
        ));

        vec![
            ChatMessage::system(agents::system_prompt(capability, query)),
            ChatMessage::user(prompt),
        ]
    }

    async fn web_context(&self, query: &str) -> Option<String> {
        let search = self.search.as_ref()?;
        match search.search(query).await {
            Ok(hits) if !hits.is_empty() => Some(format_hits(&hits)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Web search failed; continuing without it");
                None
            }
        }
    }
}

#[async_trait]
impl DocumentAnalyzer for CrewAnalyzer {
    async fn analyze(&self, query: &str, file_path: &Path) -> Result<String, AnalyzerError> {
        let query = normalize_query(Some(query));
        let file_name = crate::sanitize::redact_path(file_path);

        let path = file_path.to_path_buf();
        let content = tokio::task::spawn_blocking(move || processor::extract(&path))
            .await
            .map_err(|e| AnalyzerError::Task(e.to_string()))??;

        let report = self.run(&query, &file_name, &content.text).await?;
        report
            .final_output()
            .map(str::to_string)
            .ok_or(AnalyzerError::EmptyResponse)
    }
}
