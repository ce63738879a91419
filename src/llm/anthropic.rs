//! Anthropic messages API evaluator

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_client, user_message, verdict_from, EvaluationResult, Evaluator, MAX_TOKENS, REQUEST_TIMEOUT, SYSTEM_PROMPT};
use crate::github::Repository;

const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicEvaluator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicEvaluator {
    pub fn new(api_key: String, model: Option<String>) -> reqwest::Result<Self> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: http_client(REQUEST_TIMEOUT)?,
        })
    }

    async fn complete(&self, user: &str) -> Result<String> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: SYSTEM_PROMPT,
            messages: [Message {
                role: "user",
                content: user,
            }],
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = response.status();
        debug!(model = %self.model, status = status.as_u16(), elapsed_ms = start.elapsed().as_millis() as u64, "POST {}", ENDPOINT);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({}): {}", status, body);
        }

        let reply: MessagesResponse = response
            .json()
            .await
            .context("Failed to parse Anthropic response")?;

        Ok(reply
            .content
            .into_iter()
            .find_map(|block| block.text)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Evaluator for AnthropicEvaluator {
    async fn evaluate(&self, repo: &Repository, prompt: &str) -> EvaluationResult {
        verdict_from(self.complete(&user_message(repo, prompt)).await)
    }
}
