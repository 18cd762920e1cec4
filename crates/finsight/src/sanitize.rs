//! Helpers for sanitizing data before it enters logs and span attributes.
//!
//! Uploaded documents are named by their owners and broker URLs can carry
//! passwords, so neither goes into a log line verbatim.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips userinfo (user, password, token) from a URL.
///
/// - `redis://:hunter2@cache:6379/0` → `redis://****@cache:6379/0`
/// - `redis://localhost:6379/0` → unchanged
/// - `memory://` → unchanged
pub fn redact_url(url: &str) -> String {
    if let Some(scheme_end) = url.find("://") {
        let after_scheme = &url[scheme_end + 3..];
        let authority_end = after_scheme.find('/').unwrap_or(after_scheme.len());
        let authority = &after_scheme[..authority_end];
        if let Some(at_pos) = authority.rfind('@') {
            let scheme = &url[..scheme_end + 3];
            let rest = &after_scheme[at_pos + 1..];
            return format!("{}****@{}", scheme, rest);
        }
    }

    url.to_string()
}
