use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::QueryError;

const API_BASE: &str = "https://api.github.com";

/// Total request timeout for a single REST call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A repository returned by the search API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub full_name: String,
    pub url: String,
    pub description: String,
    pub stars: u64,
    pub language: String,
    pub topics: Vec<String>,
    pub is_fork: bool,
    /// Attached after enrichment, empty until then
    pub readme: String,
}

/// One item of a `/search/repositories` response
#[derive(Debug, Clone, Deserialize)]
struct SearchItem {
    full_name: String,
    html_url: String,
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    topics: Option<Vec<String>>,
    #[serde(default)]
    fork: bool,
}

impl From<SearchItem> for Repository {
    fn from(item: SearchItem) -> Self {
        Self {
            full_name: item.full_name,
            url: item.html_url,
            description: item.description.unwrap_or_default(),
            stars: item.stargazers_count,
            language: item.language.unwrap_or_default(),
            topics: item.topics.unwrap_or_default(),
            is_fork: item.fork,
            readme: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

/// README content response, still in its transport encoding
#[derive(Debug, Clone, Deserialize)]
pub struct ReadmePayload {
    pub content: String,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

fn default_encoding() -> String {
    "base64".to_string()
}

/// Paged repository search
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Fetch one page of star-sorted results for `query`. Pages start at 1.
    async fn search_page(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> std::result::Result<Vec<Repository>, QueryError>;
}

/// Per-repository README lookup
#[async_trait]
pub trait ReadmeSource: Send + Sync {
    /// `Ok(None)` when the repository has no README (404)
    async fn fetch_readme(&self, full_name: &str) -> Result<Option<ReadmePayload>>;
}

/// GitHub API client
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
}

impl GitHubClient {
    pub fn new(token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("repo-scout/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, token })
    }

    /// Build REST request with auth and API version headers
    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }
}

/// 403 and 429 both mean the search quota is spent
fn rate_limited(status: reqwest::StatusCode, headers: &reqwest::header::HeaderMap) -> Option<QueryError> {
    if status != reqwest::StatusCode::FORBIDDEN && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
        return None;
    }
    let reset = headers
        .get("x-ratelimit-reset")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok());
    Some(QueryError::RateLimited { reset })
}

#[async_trait]
impl SearchBackend for GitHubClient {
    async fn search_page(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> std::result::Result<Vec<Repository>, QueryError> {
        let url = format!("{}/search/repositories", API_BASE);
        let per_page = per_page.to_string();
        let page_param = page.to_string();
        let start = std::time::Instant::now();

        let response = self
            .request(&url)
            .query(&[
                ("q", query),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
                ("page", page_param.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        debug!(
            page,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "GET /search/repositories"
        );

        if let Some(err) = rate_limited(status, response.headers()) {
            return Err(err);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: SearchResponse = response
            .json()
            .await
            .map_err(|e| QueryError::Decode(e.to_string()))?;

        Ok(data.items.into_iter().map(Repository::from).collect())
    }
}

#[async_trait]
impl ReadmeSource for GitHubClient {
    async fn fetch_readme(&self, full_name: &str) -> Result<Option<ReadmePayload>> {
        let url = format!("{}/repos/{}/readme", API_BASE, full_name);

        let response = self
            .request(&url)
            .send()
            .await
            .context("Failed to send README request")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            anyhow::bail!("GitHub API error {} for {} README", response.status(), full_name);
        }

        let payload = response
            .json::<ReadmePayload>()
            .await
            .context("Failed to parse README response")?;

        Ok(Some(payload))
    }
}
