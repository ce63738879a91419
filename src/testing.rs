//! In-process stand-ins for the GitHub, LLM and Discord seams

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::discord::Notifier;
use crate::error::QueryError;
use crate::github::{ReadmePayload, ReadmeSource, Repository, SearchBackend};
use crate::llm::{EvaluationResult, Evaluator};

pub fn repo(full_name: &str, stars: u64) -> Repository {
    Repository {
        full_name: full_name.to_string(),
        url: format!("https://github.com/{}", full_name),
        description: String::new(),
        stars,
        language: String::new(),
        topics: Vec::new(),
        is_fork: false,
        readme: String::new(),
    }
}

/// Serves canned pages per query string; pages past the end are empty
#[derive(Default)]
pub struct StubSearch {
    pages: HashMap<String, Vec<Vec<Repository>>>,
    /// query -> page number that returns HTTP 500
    fail_at: HashMap<String, u32>,
    requests: Mutex<Vec<(String, u32)>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(mut self, query: &str, pages: Vec<Vec<Repository>>) -> Self {
        self.pages.insert(query.to_string(), pages);
        self
    }

    pub fn failing_at(mut self, query: &str, page: u32) -> Self {
        self.fail_at.insert(query.to_string(), page);
        self
    }

    pub fn pages_requested(&self, query: &str) -> Vec<u32> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _)| q == query)
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn queries(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(q, _)| seen.insert(q.clone()))
            .map(|(q, _)| q.clone())
            .collect()
    }
}

#[async_trait]
impl SearchBackend for StubSearch {
    async fn search_page(
        &self,
        query: &str,
        page: u32,
        _per_page: u32,
    ) -> std::result::Result<Vec<Repository>, QueryError> {
        self.requests.lock().unwrap().push((query.to_string(), page));

        if self.fail_at.get(query) == Some(&page) {
            return Err(QueryError::Status {
                status: 500,
                body: "boom".into(),
            });
        }

        Ok(self
            .pages
            .get(query)
            .and_then(|pages| pages.get(page as usize - 1))
            .cloned()
            .unwrap_or_default())
    }
}

pub enum StubReadme {
    /// Served base64-encoded, as GitHub does
    Text(String),
    Raw(ReadmePayload),
    NotFound,
    Fail,
    /// Never answers within any sane timeout
    Stall,
}

/// README source that records how many fetches overlap
#[derive(Default)]
pub struct StubReadmes {
    responses: HashMap<String, StubReadme>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl StubReadmes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, full_name: &str, response: StubReadme) -> Self {
        self.responses.insert(full_name.to_string(), response);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, full_name: &str) -> Result<Option<ReadmePayload>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.responses.get(full_name) {
            Some(StubReadme::Text(text)) => Ok(Some(ReadmePayload {
                content: base64::engine::general_purpose::STANDARD.encode(text.as_bytes()),
                encoding: "base64".into(),
            })),
            Some(StubReadme::Raw(payload)) => Ok(Some(payload.clone())),
            Some(StubReadme::NotFound) | None => Ok(None),
            Some(StubReadme::Fail) => anyhow::bail!("GitHub API error 502 Bad Gateway"),
            Some(StubReadme::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ReadmeSource for StubReadmes {
    async fn fetch_readme(&self, full_name: &str) -> Result<Option<ReadmePayload>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = self.respond(full_name).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Interested in a fixed set of repositories, records what it saw
#[derive(Default)]
pub struct StubEvaluator {
    interested: HashSet<String>,
    pub seen: Mutex<Vec<(String, String)>>,
}

impl StubEvaluator {
    pub fn interested_in(names: &[&str]) -> Self {
        Self {
            interested: names.iter().map(|n| n.to_string()).collect(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Evaluator for StubEvaluator {
    async fn evaluate(&self, repo: &Repository, _prompt: &str) -> EvaluationResult {
        self.seen
            .lock()
            .unwrap()
            .push((repo.full_name.clone(), repo.readme.clone()));

        let interested = self.interested.contains(&repo.full_name);
        EvaluationResult {
            interested,
            reason: if interested { "matches".into() } else { "not relevant".into() },
        }
    }
}

/// Notifier that keeps everything it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    pub summaries: Mutex<Vec<(usize, usize)>>,
    pub batches: Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_summary(&self, total_found: usize, total_processed: usize) -> Result<()> {
        self.summaries.lock().unwrap().push((total_found, total_processed));
        Ok(())
    }

    async fn send_repos(
        &self,
        matched: &[(Repository, EvaluationResult)],
        batch_size: usize,
    ) -> Result<()> {
        for chunk in matched.chunks(batch_size.max(1)) {
            self.batches
                .lock()
                .unwrap()
                .push(chunk.iter().map(|(r, _)| r.full_name.clone()).collect());
        }
        Ok(())
    }
}
