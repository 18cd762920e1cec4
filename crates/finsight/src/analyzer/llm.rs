//! Chat completions against an Azure OpenAI deployment.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::AnalyzerError;
use crate::config::AzureConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A model that turns a conversation into one reply.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AnalyzerError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for an Azure OpenAI chat deployment.
///
/// The deployment in use rejects `stop`, so requests never send it.
pub struct AzureOpenAiClient {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
    temperature: f32,
}

impl AzureOpenAiClient {
    pub fn new(
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: SecretString,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            url: completions_url(endpoint, deployment, api_version),
            api_key,
            temperature: 1.0,
        })
    }

    /// Builds a client from settings; endpoint and key are required.
    pub fn from_config(config: &AzureConfig, request_timeout: Duration) -> Result<Self, ConfigError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(ConfigError::Missing("AZURE_OPENAI_ENDPOINT"))?;
        let api_key = config
            .api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_string()))
            .ok_or(ConfigError::Missing("AZURE_OPENAI_API_KEY"))?;

        Self::new(
            endpoint,
            &config.deployment,
            &config.api_version,
            api_key,
            request_timeout,
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim().trim_end_matches('/'),
        deployment,
        api_version
    )
}

fn parse_completion(body: &str) -> Result<String, AnalyzerError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| AnalyzerError::Parse(e.to_string()))?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return Err(AnalyzerError::EmptyResponse);
    }
    Ok(content)
}

#[async_trait]
impl ChatModel for AzureOpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AnalyzerError> {
        let started = std::time::Instant::now();
        let body = ChatCompletionRequest {
            messages,
            temperature: self.temperature,
        };
        let res = self
            .client
            .post(&self.url)
            .header("api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;

        tracing::debug!(
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Chat completion returned"
        );

        if !status.is_success() {
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};

    #[test]
    fn test_completions_url() {
        assert_eq!(
            completions_url("https://acme.openai.azure.com/", "gpt-5.2-chat", "2024-02-15-preview"),
            "https://acme.openai.azure.com/openai/deployments/gpt-5.2-chat/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":" Yes, it is. "}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Yes, it is.");
    }

    #[test]
    fn test_parse_completion_empty() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(AnalyzerError::EmptyResponse)
        ));
        assert!(matches!(
            parse_completion(r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(AnalyzerError::EmptyResponse)
        ));
        assert!(matches!(parse_completion("<html>"), Err(AnalyzerError::Parse(_))));
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = AzureConfig::default();
        assert!(matches!(
            AzureOpenAiClient::from_config(&config, Duration::from_secs(5)),
            Err(ConfigError::Missing("AZURE_OPENAI_ENDPOINT"))
        ));

        let config = AzureConfig {
            endpoint: Some("https://acme.openai.azure.com".to_string()),
            ..AzureConfig::default()
        };
        assert!(matches!(
            AzureOpenAiClient::from_config(&config, Duration::from_secs(5)),
            Err(ConfigError::Missing("AZURE_OPENAI_API_KEY"))
        ));

        let config = AzureConfig {
            api_key: Some(SecretString::from("sk-test".to_string())),
            ..config
        };
        let client = AzureOpenAiClient::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url(),
            "https://acme.openai.azure.com/openai/deployments/gpt-5.2-chat/chat/completions?api-version=2024-02-15-preview"
        );
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_complete_against_local_server() {
        let app = Router::new().route(
            "/openai/deployments/analyst/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("api-key").unwrap(), "sk-test");
                assert!(body.get("stop").is_none());
                assert_eq!(body["temperature"], 1.0);
                let last = body["messages"][1]["content"].as_str().unwrap().to_string();
                Json(serde_json::json!({
                    "choices": [{ "message": { "role": "assistant", "content": format!("echo: {}", last) } }]
                }))
            }),
        );
        let endpoint = serve(app).await;

        let client = AzureOpenAiClient::new(
            &endpoint,
            "analyst",
            "2024-02-15-preview",
            SecretString::from("sk-test".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        let reply = client
            .complete(&[ChatMessage::system("sys"), ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "echo: hi");
    }

    #[tokio::test]
    async fn test_complete_reports_api_errors() {
        let app = Router::new().route(
            "/openai/deployments/analyst/chat/completions",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let endpoint = serve(app).await;

        let client = AzureOpenAiClient::new(
            &endpoint,
            "analyst",
            "v1",
            SecretString::from("sk-test".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        match client.complete(&[ChatMessage::user("hi")]).await {
            Err(AnalyzerError::Api { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }
}
