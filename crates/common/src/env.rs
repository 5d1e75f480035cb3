use anyhow::{anyhow, Result};

/// Loads `.env` from the working directory (or a parent) into the process
/// environment. Variables already set in the environment win.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Failed to parse .env file: {}", e),
    }
}

/// Unwraps a connection string that clap resolved from either a flag or an
/// environment variable, naming both in the error.
pub fn require_url(value: Option<String>, flag: &str, env_var: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("{} is not set (pass {} or set {})", env_var, flag, env_var))
}

/// Masks the password component of a connection URL so it can be logged.
///
/// `postgres://cms:secret@db:5432/cms` becomes `postgres://cms:***@db:5432/cms`.
/// Strings that are not URLs with credentials are returned unchanged.
pub fn redact_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.rfind('@') else {
        return url.to_string();
    };
    let credentials = &rest[..at];
    match credentials.find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..scheme_end + 3],
            &credentials[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}
