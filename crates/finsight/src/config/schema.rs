use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

/// Query used when a request omits one or sends only whitespace.
pub const DEFAULT_QUERY: &str = "Analyze this financial document for investment insights";

/// Service settings, built once at startup and shared behind an `Arc`.
#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default = "default_queue_url")]
    pub queue_url: String,
    #[serde(default = "default_queue_key")]
    pub queue_key: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_analysis_timeout_secs")]
    pub analysis_timeout_secs: u64,
    #[serde(default)]
    pub stale_job_secs: Option<u64>,
    #[serde(default = "default_max_document_chars")]
    pub max_document_chars: usize,
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_queue_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_queue_key() -> String {
    "finsight:analysis_tasks".to_string()
}

fn default_database_url() -> String {
    crate::db::DEFAULT_DATABASE_URL.to_string()
}

fn default_outputs_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_analysis_timeout_secs() -> u64 {
    600
}

fn default_max_document_chars() -> usize {
    100_000
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            azure: AzureConfig::default(),
            search: SearchConfig::default(),
            queue_url: default_queue_url(),
            queue_key: default_queue_key(),
            database_url: default_database_url(),
            outputs_dir: default_outputs_dir(),
            data_dir: default_data_dir(),
            worker_count: default_worker_count(),
            analysis_timeout_secs: default_analysis_timeout_secs(),
            stale_job_secs: None,
            max_document_chars: default_max_document_chars(),
            bind: default_bind(),
        }
    }
}

impl Settings {
    pub fn analysis_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.analysis_timeout_secs)
    }

    pub fn stale_job_age(&self) -> Option<std::time::Duration> {
        self.stale_job_secs.map(std::time::Duration::from_secs)
    }
}

/// Azure OpenAI chat deployment used by the analysis crew.
#[derive(Debug, Deserialize)]
pub struct AzureConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_deployment")]
    pub deployment: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Path to a file holding the API key.
    #[serde(default)]
    pub api_key_file: Option<String>,
    /// Name of an environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Resolved key. Never read from or written to the settings file.
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

fn default_deployment() -> String {
    "gpt-5.2-chat".to_string()
}

fn default_api_version() -> String {
    "2024-02-15-preview".to_string()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: default_deployment(),
            api_version: default_api_version(),
            api_key_file: None,
            api_key_env: None,
            api_key: None,
        }
    }
}

/// Optional Serper web search fed into the investment step.
#[derive(Debug, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

fn default_search_endpoint() -> String {
    "https://google.serper.dev/search".to_string()
}

fn default_search_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_search_results(),
            api_key_file: None,
            api_key_env: None,
            api_key: None,
        }
    }
}

impl SearchConfig {
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}
