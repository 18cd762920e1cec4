use std::env::VarError;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::schema::Settings;
use crate::error::ConfigError;
use crate::secrets::resolve_secret_optional;

/// Environment variable naming an optional JSON settings file.
pub const CONFIG_PATH_ENV: &str = "FINSIGHT_CONFIG";

/// Loads settings from the process environment.
///
/// Order: JSON file (`path`, else `FINSIGHT_CONFIG`), then environment
/// overrides, then secret resolution and validation.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_settings`] with an injectable environment lookup.
pub fn load_settings_with<F>(path: Option<&Path>, env: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    let path = path
        .map(Path::to_path_buf)
        .or_else(|| lookup(CONFIG_PATH_ENV).map(PathBuf::from));

    let mut settings = match path {
        Some(path) => load_settings_file(&path)?,
        None => Settings::default(),
    };

    apply_env_overrides(&mut settings, &lookup)?;
    resolve_secrets(&mut settings, &lookup)?;
    validate_settings(&settings)?;

    Ok(settings)
}

pub fn load_settings_file(path: &Path) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_settings_from_str(&content)
}

pub fn load_settings_from_str(content: &str) -> Result<Settings, ConfigError> {
    let settings: Settings = serde_json::from_str(content)?;
    Ok(settings)
}

fn apply_env_overrides<F>(settings: &mut Settings, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = env("AZURE_OPENAI_ENDPOINT") {
        settings.azure.endpoint = Some(v.trim().to_string());
    }
    if let Some(v) = env("AZURE_OPENAI_DEPLOYMENT") {
        settings.azure.deployment = v.trim().to_string();
    }
    if let Some(v) = env("AZURE_OPENAI_API_VERSION") {
        settings.azure.api_version = v.trim().to_string();
    }
    if let Some(v) = env("REDIS_URL") {
        settings.queue_url = v.trim().to_string();
    }
    if let Some(v) = env("QUEUE_KEY") {
        settings.queue_key = v.trim().to_string();
    }
    if let Some(v) = env("DATABASE_URL") {
        settings.database_url = v.trim().to_string();
    }
    if let Some(v) = env("OUTPUTS_DIR") {
        settings.outputs_dir = PathBuf::from(v.trim());
    }
    if let Some(v) = env("DATA_DIR") {
        settings.data_dir = PathBuf::from(v.trim());
    }
    if let Some(v) = env("WORKER_COUNT") {
        settings.worker_count = parse_value("WORKER_COUNT", &v)?;
    }
    if let Some(v) = env("ANALYSIS_TIMEOUT_SECS") {
        settings.analysis_timeout_secs = parse_value("ANALYSIS_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = env("STALE_JOB_SECS") {
        settings.stale_job_secs = Some(parse_value("STALE_JOB_SECS", &v)?);
    }
    if let Some(v) = env("MAX_DOCUMENT_CHARS") {
        settings.max_document_chars = parse_value("MAX_DOCUMENT_CHARS", &v)?;
    }
    if let Some(v) = env("BIND_ADDR") {
        settings.bind = v.trim().to_string();
    }
    Ok(())
}

fn resolve_secrets<F>(settings: &mut Settings, env: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |name: &str| env(name).ok_or(VarError::NotPresent);

    let azure_key = env("AZURE_OPENAI_API_KEY");
    let azure_key_file = env("AZURE_OPENAI_API_KEY_FILE").or(settings.azure.api_key_file.clone());
    let azure_key_env = env("AZURE_OPENAI_API_KEY_ENV").or(settings.azure.api_key_env.clone());
    settings.azure.api_key = resolve_secret_optional(
        azure_key.as_deref(),
        azure_key_file.as_deref(),
        azure_key_env.as_deref(),
        lookup,
    )?;

    let serper_key = env("SERPER_API_KEY");
    let serper_key_file = env("SERPER_API_KEY_FILE").or(settings.search.api_key_file.clone());
    let serper_key_env = env("SERPER_API_KEY_ENV").or(settings.search.api_key_env.clone());
    settings.search.api_key = resolve_secret_optional(
        serper_key.as_deref(),
        serper_key_file.as_deref(),
        serper_key_env.as_deref(),
        lookup,
    )?;

    Ok(())
}

fn parse_value<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    if settings.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "worker_count must be at least 1".to_string(),
        });
    }

    if settings.analysis_timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "analysis_timeout_secs must be greater than zero".to_string(),
        });
    }

    if settings.stale_job_secs == Some(0) {
        return Err(ConfigError::Validation {
            message: "stale_job_secs must be greater than zero when set".to_string(),
        });
    }

    if let Some(stale) = settings.stale_job_secs {
        if stale <= settings.analysis_timeout_secs {
            return Err(ConfigError::Validation {
                message: format!(
                    "stale_job_secs ({}) must be greater than analysis_timeout_secs ({})",
                    stale, settings.analysis_timeout_secs
                ),
            });
        }
    }

    if settings.max_document_chars == 0 {
        return Err(ConfigError::Validation {
            message: "max_document_chars must be greater than zero".to_string(),
        });
    }

    if settings.queue_key.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "queue_key must not be empty".to_string(),
        });
    }

    crate::db::DatabaseLocation::parse(&settings.database_url).map_err(|e| {
        ConfigError::InvalidValue {
            name: "DATABASE_URL".to_string(),
            value: crate::sanitize::redact_url(&settings.database_url),
            reason: e.to_string(),
        }
    })?;

    crate::queue::QueueBackend::parse(&settings.queue_url).map_err(|e| {
        ConfigError::InvalidValue {
            name: "REDIS_URL".to_string(),
            value: crate::sanitize::redact_url(&settings.queue_url),
            reason: e.to_string(),
        }
    })?;

    if let Some(endpoint) = &settings.azure.endpoint {
        if !endpoint.starts_with("https://") && !endpoint.starts_with("http://") {
            return Err(ConfigError::InvalidValue {
                name: "AZURE_OPENAI_ENDPOINT".to_string(),
                value: endpoint.clone(),
                reason: "must be an http(s) URL".to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let settings = load_settings_with(None, env_of(&[])).unwrap();
        assert_eq!(settings.queue_url, "redis://localhost:6379/0");
        assert!(settings.azure.api_key.is_none());
        assert!(settings.azure.endpoint.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let settings = load_settings_with(
            None,
            env_of(&[
                ("AZURE_OPENAI_API_KEY", "sk-test"),
                ("AZURE_OPENAI_ENDPOINT", "https://acme.openai.azure.com/"),
                ("AZURE_OPENAI_DEPLOYMENT", "analyst"),
                ("REDIS_URL", "memory://"),
                ("DATABASE_URL", "sqlite::memory:"),
                ("OUTPUTS_DIR", "/var/finsight/out"),
                ("WORKER_COUNT", "4"),
                ("ANALYSIS_TIMEOUT_SECS", "30"),
                ("STALE_JOB_SECS", "3600"),
                ("SERPER_API_KEY", "serper"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.azure.api_key.unwrap().expose_secret(), "sk-test");
        assert_eq!(settings.azure.deployment, "analyst");
        assert_eq!(settings.queue_url, "memory://");
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.outputs_dir, PathBuf::from("/var/finsight/out"));
        assert_eq!(settings.worker_count, 4);
        assert_eq!(settings.analysis_timeout_secs, 30);
        assert_eq!(settings.stale_job_secs, Some(3600));
        assert!(settings.search.enabled());
    }

    #[test]
    fn test_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finsight.json");
        std::fs::write(
            &path,
            r#"{ "worker_count": 2, "data_dir": "/srv/data", "queue_url": "memory://" }"#,
        )
        .unwrap();

        let settings =
            load_settings_with(Some(path.as_path()), env_of(&[("WORKER_COUNT", "6")])).unwrap();
        assert_eq!(settings.worker_count, 6);
        assert_eq!(settings.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(settings.queue_url, "memory://");
    }

    #[test]
    fn test_config_path_from_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finsight.json");
        std::fs::write(&path, r#"{ "max_document_chars": 500 }"#).unwrap();

        let settings = load_settings_with(
            None,
            env_of(&[(CONFIG_PATH_ENV, path.to_str().unwrap())]),
        )
        .unwrap();
        assert_eq!(settings.max_document_chars, 500);
    }

    #[test]
    fn test_api_key_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("azure_key");
        std::fs::write(&key, "from-file\n").unwrap();

        let settings = load_settings_with(
            None,
            env_of(&[("AZURE_OPENAI_API_KEY_FILE", key.to_str().unwrap())]),
        )
        .unwrap();
        assert_eq!(
            settings.azure.api_key.unwrap().expose_secret(),
            "from-file"
        );
    }

    #[test]
    fn test_api_key_from_referenced_env_var() {
        let settings = load_settings_with(
            None,
            env_of(&[
                ("AZURE_OPENAI_API_KEY_ENV", "VAULT_AZURE_KEY"),
                ("VAULT_AZURE_KEY", "sk-vault"),
                ("SERPER_API_KEY_ENV", "VAULT_SERPER_KEY"),
                ("VAULT_SERPER_KEY", "serper-vault"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.azure.api_key.unwrap().expose_secret(), "sk-vault");
        assert_eq!(
            settings.search.api_key.unwrap().expose_secret(),
            "serper-vault"
        );
    }

    #[test]
    fn test_referenced_env_var_must_be_set() {
        let result = load_settings_with(
            None,
            env_of(&[("AZURE_OPENAI_API_KEY_ENV", "VAULT_AZURE_KEY")]),
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("VAULT_AZURE_KEY"), "{}", err);
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let settings =
            load_settings_with(None, env_of(&[("WORKER_COUNT", "  "), ("REDIS_URL", "")]))
                .unwrap();
        assert!(settings.worker_count >= 1);
        assert_eq!(settings.queue_url, "redis://localhost:6379/0");
    }

    #[test]
    fn test_invalid_number() {
        let result = load_settings_with(None, env_of(&[("WORKER_COUNT", "many")]));
        match result {
            Err(ConfigError::InvalidValue { name, .. }) => assert_eq!(name, "WORKER_COUNT"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = load_settings_with(None, env_of(&[("WORKER_COUNT", "0")]));
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_non_sqlite_database_rejected() {
        let result = load_settings_with(
            None,
            env_of(&[("DATABASE_URL", "postgresql://localhost/finsight")]),
        );
        match result {
            Err(ConfigError::InvalidValue { name, .. }) => assert_eq!(name, "DATABASE_URL"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_queue_scheme_rejected() {
        let result = load_settings_with(None, env_of(&[("REDIS_URL", "amqp://guest@rabbit")]));
        match result {
            Err(ConfigError::InvalidValue { name, value, .. }) => {
                assert_eq!(name, "REDIS_URL");
                assert!(!value.contains("guest"));
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_config_file() {
        let result = load_settings_file(Path::new("/nonexistent/finsight.json"));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn test_malformed_config_file() {
        assert!(matches!(
            load_settings_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }
}
