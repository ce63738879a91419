//! Discord webhook notifications

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::github::Repository;
use crate::llm::EvaluationResult;

/// GitHub green
const EMBED_COLOR: u32 = 0x238636;

/// Where matched repositories get reported
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_summary(&self, total_found: usize, total_processed: usize) -> Result<()>;

    /// Send matches in chunks of `batch_size` per message
    async fn send_repos(
        &self,
        matched: &[(Repository, EvaluationResult)],
        batch_size: usize,
    ) -> Result<()>;
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub url: String,
    pub description: String,
    pub color: u32,
}

#[derive(Serialize)]
struct EmbedPayload<'a> {
    embeds: &'a [Embed],
}

#[derive(Serialize)]
struct ContentPayload<'a> {
    content: &'a str,
}

pub fn format_repo_embed(repo: &Repository, result: &EvaluationResult) -> Embed {
    let language = if repo.language.is_empty() {
        "Unknown"
    } else {
        &repo.language
    };
    let topics = if repo.topics.is_empty() {
        "none".to_string()
    } else {
        repo.topics.join(", ")
    };

    let mut description = format!("⭐ {} stars | 🗂️ {}\n\n", repo.stars, language);
    if !repo.description.is_empty() {
        description.push_str(&format!("{}\n\n", repo.description));
    }
    description.push_str(&format!("**Topics:** {}\n\n💡 *{}*", topics, result.reason));

    Embed {
        title: repo.full_name.clone(),
        url: repo.url.clone(),
        description,
        color: EMBED_COLOR,
    }
}

pub fn summary_message(total_found: usize, total_processed: usize) -> String {
    format!(
        "🔍 **GitHub Discovery Report**\nProcessed {} repos, found {} interesting projects.",
        total_processed, total_found
    )
}

pub struct DiscordNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordNotifier {
    pub fn new(webhook_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            webhook_url,
            client,
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, payload: &T) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(payload)
            .send()
            .await
            .context("Discord webhook request failed")?;

        let status = response.status();
        debug!(status = status.as_u16(), "POST discord webhook");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Discord webhook error ({}): {}", status, body);
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_summary(&self, total_found: usize, total_processed: usize) -> Result<()> {
        let content = summary_message(total_found, total_processed);
        self.post(&ContentPayload { content: &content }).await
    }

    async fn send_repos(
        &self,
        matched: &[(Repository, EvaluationResult)],
        batch_size: usize,
    ) -> Result<()> {
        for chunk in matched.chunks(batch_size.max(1)) {
            let embeds: Vec<Embed> = chunk
                .iter()
                .map(|(repo, result)| format_repo_embed(repo, result))
                .collect();
            self.post(&EmbedPayload { embeds: &embeds }).await?;
        }
        Ok(())
    }
}
