//! Repository evaluation backends
//!
//! Every backend asks its model the same question and expects a one-line
//! JSON verdict back. Failures never propagate: they become a
//! "not interested" result carrying the error as the reason.

mod anthropic;
mod google;
mod openai;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::error::ConfigError;
use crate::github::Repository;
use crate::readme::truncate_chars;

pub use anthropic::AnthropicEvaluator;
pub use google::GoogleEvaluator;
pub use openai::OpenAIEvaluator;

/// Provider names accepted by [`create_evaluator`]
pub const PROVIDERS: &[&str] = &["openai", "anthropic", "google"];

/// README characters shown to the model
const README_EXCERPT_CHARS: usize = 500;

/// Raw reply characters kept when the reply cannot be parsed
const RAW_REPLY_CHARS: usize = 200;

/// Completion budget; the verdict is a single short sentence
const MAX_TOKENS: u32 = 150;

/// Upper bound on one evaluation request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub(crate) const SYSTEM_PROMPT: &str = r#"You are a GitHub project evaluator. Given a user's interests and a project's metadata, decide if this project would interest them.

Respond ONLY with valid JSON in this exact format:
{"interested": true, "reason": "one sentence explanation"}

or

{"interested": false, "reason": "one sentence explanation"}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub interested: bool,
    pub reason: String,
}

impl EvaluationResult {
    fn rejected(reason: String) -> Self {
        Self {
            interested: false,
            reason,
        }
    }
}

#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Decide whether `repo` matches the interests described in `prompt`
    async fn evaluate(&self, repo: &Repository, prompt: &str) -> EvaluationResult;
}

/// Build the evaluator for `provider`. An empty `model` picks the
/// provider's default.
pub fn create_evaluator(
    provider: &str,
    model: &str,
    api_key: &str,
) -> Result<Box<dyn Evaluator>, ConfigError> {
    let model = (!model.is_empty()).then(|| model.to_string());

    let evaluator: Box<dyn Evaluator> = match provider {
        "openai" => Box::new(OpenAIEvaluator::new(api_key.to_string(), model)?),
        "anthropic" => Box::new(AnthropicEvaluator::new(api_key.to_string(), model)?),
        "google" => Box::new(GoogleEvaluator::new(api_key.to_string(), model)?),
        other => {
            return Err(ConfigError::UnknownProvider {
                name: other.to_string(),
                available: PROVIDERS.to_vec(),
            })
        }
    };

    Ok(evaluator)
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// The project description every backend sends
pub(crate) fn user_message(repo: &Repository, prompt: &str) -> String {
    let topics = if repo.topics.is_empty() {
        "none".to_string()
    } else {
        repo.topics.join(", ")
    };
    let readme = if repo.readme.is_empty() {
        "none".to_string()
    } else {
        truncate_chars(&repo.readme, README_EXCERPT_CHARS)
    };

    format!(
        "User interests:\n{}\n\nProject:\n- Name: {}\n- Description: {}\n- Language: {}\n- Topics: {}\n- Stars: {}\n- README excerpt: {}",
        prompt, repo.full_name, repo.description, repo.language, topics, repo.stars, readme
    )
}

#[derive(Deserialize)]
struct Verdict {
    #[serde(default)]
    interested: bool,
    reason: Option<String>,
}

/// Pull the JSON out of a Markdown code fence if the model added one
fn strip_code_fence(content: &str) -> &str {
    let inner = if let Some((_, rest)) = content.split_once("```json") {
        rest
    } else if let Some((_, rest)) = content.split_once("```") {
        rest
    } else {
        return content.trim();
    };

    inner.split("```").next().unwrap_or(inner).trim()
}

/// Interpret a model reply
pub(crate) fn parse_verdict(content: &str) -> EvaluationResult {
    match serde_json::from_str::<Verdict>(strip_code_fence(content)) {
        Ok(verdict) => EvaluationResult {
            interested: verdict.interested,
            reason: verdict
                .reason
                .unwrap_or_else(|| "No reason provided".to_string()),
        },
        Err(_) => {
            let raw = if content.is_empty() {
                "empty response".to_string()
            } else {
                truncate_chars(content, RAW_REPLY_CHARS)
            };
            EvaluationResult::rejected(format!("Failed to parse LLM response: {}", raw))
        }
    }
}

/// Turn a backend call into a verdict, folding errors into the reason
pub(crate) fn verdict_from(reply: anyhow::Result<String>) -> EvaluationResult {
    match reply {
        Ok(content) => parse_verdict(&content),
        Err(e) => EvaluationResult::rejected(format!("Error: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::repo;

    #[test]
    fn test_parse_plain_json() {
        let result = parse_verdict(r#"{"interested": true, "reason": "Great tool"}"#);
        assert!(result.interested);
        assert_eq!(result.reason, "Great tool");
    }

    #[test]
    fn test_parse_json_code_fence() {
        let reply = "Sure!\n```json\n{\"interested\": false, \"reason\": \"Too niche\"}\n```\n";
        let result = parse_verdict(reply);
        assert!(!result.interested);
        assert_eq!(result.reason, "Too niche");
    }

    #[test]
    fn test_parse_bare_code_fence() {
        let reply = "```\n{\"interested\": true, \"reason\": \"AI\"}\n```";
        assert!(parse_verdict(reply).interested);
    }

    #[test]
    fn test_parse_missing_fields_default() {
        let result = parse_verdict("{}");
        assert!(!result.interested);
        assert_eq!(result.reason, "No reason provided");
    }

    #[test]
    fn test_parse_garbage() {
        let result = parse_verdict("I think yes");
        assert!(!result.interested);
        assert_eq!(result.reason, "Failed to parse LLM response: I think yes");

        let result = parse_verdict("");
        assert_eq!(result.reason, "Failed to parse LLM response: empty response");
    }

    #[test]
    fn test_parse_garbage_truncated() {
        let result = parse_verdict(&"x".repeat(1000));
        assert_eq!(
            result.reason.len(),
            "Failed to parse LLM response: ".len() + RAW_REPLY_CHARS
        );
    }

    #[test]
    fn test_verdict_from_error() {
        let result = verdict_from(Err(anyhow::anyhow!("OpenAI API error (401): bad key")));
        assert!(!result.interested);
        assert_eq!(result.reason, "Error: OpenAI API error (401): bad key");
    }

    #[test]
    fn test_user_message_defaults() {
        let r = repo("owner/tool", 42);
        let msg = user_message(&r, "I like AI tools");

        assert!(msg.starts_with("User interests:\nI like AI tools\n\nProject:\n"));
        assert!(msg.contains("- Name: owner/tool\n"));
        assert!(msg.contains("- Topics: none\n"));
        assert!(msg.contains("- Stars: 42\n"));
        assert!(msg.ends_with("- README excerpt: none"));
    }

    #[test]
    fn test_user_message_readme_excerpt() {
        let mut r = repo("owner/tool", 1);
        r.topics = vec!["ai".into(), "cli".into()];
        r.readme = "r".repeat(800);

        let msg = user_message(&r, "p");
        assert!(msg.contains("- Topics: ai, cli\n"));
        assert!(msg.ends_with(&format!("- README excerpt: {}", "r".repeat(500))));
    }

    #[test]
    fn test_factory_known_providers() {
        for provider in PROVIDERS {
            assert!(create_evaluator(provider, "", "key").is_ok());
        }
    }

    #[test]
    fn test_factory_unknown_provider() {
        let err = create_evaluator("mistral", "m", "key").err().unwrap();
        match err {
            ConfigError::UnknownProvider { name, available } => {
                assert_eq!(name, "mistral");
                assert_eq!(available, vec!["openai", "anthropic", "google"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_http_client_gives_up_on_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let client = http_client(Duration::from_millis(200)).unwrap();
        let err = client
            .post(format!("http://{}/v1/messages", addr))
            .send()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        server.abort();
    }
}
