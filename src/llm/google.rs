//! Google Gemini evaluator

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{http_client, user_message, verdict_from, EvaluationResult, Evaluator, MAX_TOKENS, REQUEST_TIMEOUT, SYSTEM_PROMPT};
use crate::github::Repository;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GoogleEvaluator {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GoogleEvaluator {
    pub fn new(api_key: String, model: Option<String>) -> reqwest::Result<Self> {
        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: http_client(REQUEST_TIMEOUT)?,
        })
    }

    async fn complete(&self, text: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: MAX_TOKENS,
            },
        };
        let url = format!("{}/{}:generateContent", API_BASE, self.model);

        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Google request failed")?;

        let status = response.status();
        debug!(model = %self.model, status = status.as_u16(), elapsed_ms = start.elapsed().as_millis() as u64, "POST {}", url);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Google API error ({}): {}", status, body);
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Google response")?;

        Ok(reply
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Evaluator for GoogleEvaluator {
    async fn evaluate(&self, repo: &Repository, prompt: &str) -> EvaluationResult {
        // Gemini gets the instructions inline rather than as a system turn
        let text = format!("{}\n\n{}", SYSTEM_PROMPT, user_message(repo, prompt));
        verdict_from(self.complete(&text).await)
    }
}
