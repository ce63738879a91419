//! OpenAI chat completions evaluator

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_client, user_message, verdict_from, EvaluationResult, Evaluator, MAX_TOKENS, REQUEST_TIMEOUT, SYSTEM_PROMPT};
use crate::github::Repository;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAIEvaluator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenAIEvaluator {
    pub fn new(api_key: String, model: Option<String>) -> reqwest::Result<Self> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: http_client(REQUEST_TIMEOUT)?,
        })
    }

    async fn complete(&self, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
            max_tokens: MAX_TOKENS,
        };

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(ENDPOINT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = response.status();
        debug!(model = %self.model, status = status.as_u16(), elapsed_ms = start.elapsed().as_millis() as u64, "POST {}", ENDPOINT);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({}): {}", status, body);
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenAI response")?;

        Ok(reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Evaluator for OpenAIEvaluator {
    async fn evaluate(&self, repo: &Repository, prompt: &str) -> EvaluationResult {
        verdict_from(self.complete(&user_message(repo, prompt)).await)
    }
}
