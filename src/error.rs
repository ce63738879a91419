//! Error types shared across the discovery pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a required search page request.
///
/// Aborts the batch that issued the request; other batches keep going.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Network or TLS failure before a response arrived
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status other than rate limiting
    #[error("GitHub search API error {status}: {body}")]
    Status { status: u16, body: String },

    /// 403/429 from the provider. Not retried.
    #[error("GitHub search rate limit exceeded{}", reset_suffix(.reset))]
    RateLimited { reset: Option<u64> },

    /// Response body was not the expected JSON
    #[error("failed to parse search response: {0}")]
    Decode(String),
}

fn reset_suffix(reset: &Option<u64>) -> String {
    match reset {
        Some(ts) => format!(" (resets at unix {ts})"),
        None => String::new(),
    }
}

/// A required input is absent or malformed. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Missing required setting `{0}`")]
    Missing(&'static str),

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Unknown LLM provider: {name}. Available: {}", .available.join(", "))]
    UnknownProvider {
        name: String,
        available: Vec<&'static str>,
    },

    #[error("Could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid --since value `{0}`: expected 12h, 7d, 1m or YYYY-MM-DD")]
    InvalidSince(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_message_includes_reset() {
        let err = QueryError::RateLimited { reset: Some(1700000000) };
        assert_eq!(
            err.to_string(),
            "GitHub search rate limit exceeded (resets at unix 1700000000)"
        );

        let err = QueryError::RateLimited { reset: None };
        assert_eq!(err.to_string(), "GitHub search rate limit exceeded");
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let err = ConfigError::UnknownProvider {
            name: "mistral".into(),
            available: vec!["openai", "anthropic", "google"],
        };
        let msg = err.to_string();
        assert!(msg.contains("mistral"));
        assert!(msg.contains("openai, anthropic, google"));
    }
}
