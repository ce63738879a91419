//! Concurrent README enrichment
//!
//! Fetches READMEs under a fixed concurrency bound. A missing or failed
//! README never fails the batch: it maps to an empty string.

use anyhow::{Context, Result};
use base64::Engine;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::github::{ReadmePayload, ReadmeSource, Repository};

/// Per-fetch timeout when none is configured
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ReadmeEnricher<'a> {
    source: &'a dyn ReadmeSource,
    concurrency: usize,
    timeout: Duration,
}

impl<'a> ReadmeEnricher<'a> {
    pub fn new(source: &'a dyn ReadmeSource, concurrency: usize, timeout: Duration) -> Self {
        Self {
            source,
            concurrency: concurrency.max(1),
            timeout,
        }
    }

    /// Fetch READMEs for all repositories, truncated to `max_chars` characters.
    ///
    /// Every input identifier is present in the result. Returns once all
    /// fetches have finished.
    pub async fn fetch_readmes(
        &self,
        repos: &[Repository],
        max_chars: usize,
    ) -> HashMap<String, String> {
        if repos.is_empty() {
            return HashMap::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        let fetches = repos.iter().map(|repo| {
            let semaphore = Arc::clone(&semaphore);
            let name = repo.full_name.clone();

            async move {
                // The semaphore is never closed
                let text = match semaphore.acquire().await {
                    Ok(_permit) => self.fetch_one(&name, max_chars).await,
                    Err(_) => String::new(),
                };
                (name, text)
            }
        });

        stream::iter(fetches)
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn fetch_one(&self, full_name: &str, max_chars: usize) -> String {
        let result = match tokio::time::timeout(self.timeout, self.source.fetch_readme(full_name)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(repo = full_name, timeout_ms = self.timeout.as_millis() as u64, "README fetch timed out");
                return String::new();
            }
        };

        match result.and_then(|payload| payload.map(|p| decode_readme(&p)).transpose()) {
            Ok(Some(text)) => truncate_chars(&text, max_chars),
            Ok(None) => String::new(),
            Err(e) => {
                debug!(repo = full_name, error = %e, "README unavailable");
                String::new()
            }
        }
    }
}

/// Decode README content from its transport encoding.
/// GitHub wraps base64 at 60 columns, so whitespace is stripped first.
/// Invalid UTF-8 is replaced rather than rejected.
pub fn decode_readme(payload: &ReadmePayload) -> Result<String> {
    if payload.encoding != "base64" {
        anyhow::bail!("Unsupported README encoding: {}", payload.encoding);
    }

    let cleaned: String = payload.content.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .context("Base64 decode error")?;

    Ok(String::from_utf8_lossy(&decoded).into_owned())
}

/// Keep at most `max_chars` characters
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
