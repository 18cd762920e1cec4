//! Secret resolution from multiple sources.
//!
//! Credentials are looked up in priority order so the same binary works in
//! local shells, Docker secrets and Kubernetes:
//!
//! 1. **Direct value** - e.g. `AZURE_OPENAI_API_KEY=...`
//! 2. **File reference** - e.g. `AZURE_OPENAI_API_KEY_FILE=/run/secrets/azure_key`
//! 3. **Env var reference** - e.g. `AZURE_OPENAI_API_KEY_ENV=VAULT_AZURE_KEY`
//!    names another variable holding the value

use secrecy::SecretString;
use std::env::VarError;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Secret file '{path}' is empty")]
    EmptyFile { path: String },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first source that yields a value, reading
/// env var references from the process environment.
///
/// Empty direct values and empty paths are treated as absent so that
/// `FOO=` in a `.env` file does not shadow `FOO_FILE`.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    resolve_secret_with(direct, file_path, env_var, |name| std::env::var(name))
}

/// [`resolve_secret`] with an injectable environment lookup.
pub fn resolve_secret_with<F>(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
    lookup: F,
) -> Result<SecretString>
where
    F: Fn(&str) -> std::result::Result<String, VarError>,
{
    if let Some(value) = direct {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_string()));
        }
    }

    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
                path: expanded.clone(),
                source: e,
            })?;
            let content = content.trim();
            if content.is_empty() {
                return Err(SecretError::EmptyFile { path: expanded });
            }
            return Ok(SecretString::from(content.to_string()));
        }
    }

    if let Some(var_name) = env_var.map(str::trim).filter(|n| !n.is_empty()) {
        return match lookup(var_name) {
            Ok(value) if !value.trim().is_empty() => {
                Ok(SecretString::from(value.trim().to_string()))
            }
            Ok(_) | Err(VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret_with`] but maps "nothing configured" to `None`.
///
/// A configured env var reference that resolves to nothing is still an error.
pub fn resolve_secret_optional<F>(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
    lookup: F,
) -> Result<Option<SecretString>>
where
    F: Fn(&str) -> std::result::Result<String, VarError>,
{
    match resolve_secret_with(direct, file_path, env_var, lookup) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

fn expand_home(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), rest);
        }
    }
    path.to_string()
}
