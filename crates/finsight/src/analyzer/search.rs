//! Optional web search (Serper) used as supplementary investment context.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::AnalyzerError;
use crate::config::SearchConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AnalyzerError>;
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

pub struct SerperClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    max_results: usize,
}

impl SerperClient {
    pub fn new(
        endpoint: &str,
        api_key: SecretString,
        max_results: usize,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
            max_results: max_results.max(1),
        })
    }

    /// Returns `None` when no Serper key is configured.
    pub fn from_config(config: &SearchConfig) -> Result<Option<Self>, ConfigError> {
        let Some(key) = config.api_key.as_ref() else {
            return Ok(None);
        };
        Self::new(
            &config.endpoint,
            SecretString::from(key.expose_secret().to_string()),
            config.max_results,
        )
        .map(Some)
    }
}

#[async_trait]
impl WebSearch for SerperClient {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, AnalyzerError> {
        let res = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose_secret())
            .json(&serde_json::json!({ "q": query, "num": self.max_results }))
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(AnalyzerError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed: SerperResponse =
            serde_json::from_str(&text).map_err(|e| AnalyzerError::Parse(e.to_string()))?;
        let mut hits = parsed.organic;
        hits.truncate(self.max_results);
        Ok(hits)
    }
}

/// Renders hits as a bulleted list for a prompt.
pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| format!("- {} ({}): {}", h.title, h.link, h.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::post, Json, Router};

    #[test]
    fn test_disabled_without_key() {
        assert!(SerperClient::from_config(&SearchConfig::default())
            .unwrap()
            .is_none());

        let config = SearchConfig {
            api_key: Some(SecretString::from("serper-key".to_string())),
            max_results: 0,
            ..SearchConfig::default()
        };
        let client = SerperClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.max_results, 1);
    }

    #[test]
    fn test_format_hits() {
        let hits = vec![SearchHit {
            title: "ACME Q3".to_string(),
            link: "https://example.com/acme".to_string(),
            snippet: "Revenue up".to_string(),
        }];
        assert_eq!(
            format_hits(&hits),
            "- ACME Q3 (https://example.com/acme): Revenue up"
        );
        assert_eq!(format_hits(&[]), "");
    }

    #[tokio::test]
    async fn test_search_against_local_server() {
        let app = Router::new().route(
            "/search",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("X-API-KEY").unwrap(), "serper-key");
                assert_eq!(body["q"], "acme outlook");
                Json(serde_json::json!({
                    "organic": [
                        { "title": "a", "link": "https://a", "snippet": "1" },
                        { "title": "b", "link": "https://b", "snippet": "2" },
                        { "title": "c", "link": "https://c", "snippet": "3" }
                    ]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = SerperClient::new(
            &format!("http://{}/search", addr),
            SecretString::from("serper-key".to_string()),
            2,
        )
        .unwrap();
        let hits = client.search("acme outlook").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "a");
    }
}
