//! Keyword batching and paginated repository search
//!
//! GitHub allows at most 5 OR operators per query, so long keyword lists are
//! split into batches of 6 which are searched one after another and merged.

use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::QueryError;
use crate::github::{Repository, SearchBackend};

/// Maximum keywords per OR group (GitHub allows 5 OR operators)
pub const MAX_KEYWORDS_PER_QUERY: usize = 6;

/// Results per search page (GitHub maximum)
pub const PAGE_SIZE: u32 = 100;

/// GitHub never serves more than 1000 search results: 10 pages of 100
pub const MAX_PAGES: u32 = 10;

/// What to search for, independent of keywords
#[derive(Debug, Clone)]
pub struct SearchWindow {
    /// Repositories created strictly after this date
    pub since: NaiveDate,
    /// Cap on new candidates returned
    pub max_repos: usize,
    pub exclude_forks: bool,
}

/// One OR-combined group of keywords
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBatch {
    pub keywords: Vec<String>,
}

impl QueryBatch {
    /// Split keywords into batches of at most [`MAX_KEYWORDS_PER_QUERY`],
    /// preserving order. No keywords yields a single unfiltered batch.
    pub fn plan(keywords: &[String]) -> Vec<QueryBatch> {
        if keywords.is_empty() {
            return vec![QueryBatch::default()];
        }

        keywords
            .chunks(MAX_KEYWORDS_PER_QUERY)
            .map(|chunk| QueryBatch {
                keywords: chunk.to_vec(),
            })
            .collect()
    }
}

/// Compose the `q` parameter for one batch
pub fn build_query(window: &SearchWindow, batch: &QueryBatch) -> String {
    let mut query = format!("created:>{}", window.since.format("%Y-%m-%d"));
    if window.exclude_forks {
        query.push_str(" fork:false");
    }
    if !batch.keywords.is_empty() {
        query.push_str(&format!(" ({})", batch.keywords.join(" OR ")));
    }
    query
}

/// Page through one query until an empty page, `cap` kept results, or the
/// provider's page ceiling. Repositories in `skip`, and forks when
/// `exclude_forks` is set, are dropped as they arrive and do not count
/// towards `cap`.
pub async fn paginate_batch(
    backend: &dyn SearchBackend,
    query: &str,
    cap: usize,
    skip: &HashSet<String>,
    exclude_forks: bool,
) -> Result<Vec<Repository>, QueryError> {
    let mut repos = Vec::new();
    let mut page = 1;

    while repos.len() < cap && page <= MAX_PAGES {
        let items = backend.search_page(query, page, PAGE_SIZE).await?;
        if items.is_empty() {
            break;
        }

        let received = items.len();
        let mut skipped = 0;
        for repo in items {
            if skip.contains(&repo.full_name) || (exclude_forks && repo.is_fork) {
                skipped += 1;
                continue;
            }
            repos.push(repo);
            if repos.len() >= cap {
                break;
            }
        }

        debug!(query, page, received, skipped, total = repos.len(), "search page");
        page += 1;
    }

    Ok(repos)
}

/// Unify per-batch results: first batch wins on duplicate identifiers,
/// then stable sort by stars descending and truncate to `cap`.
pub fn merge_results(batches: Vec<Vec<Repository>>, cap: usize) -> Vec<Repository> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();

    for repo in batches.into_iter().flatten() {
        if seen.insert(repo.full_name.clone()) {
            merged.push(repo);
        }
    }

    merged.sort_by(|a, b| b.stars.cmp(&a.stars));
    merged.truncate(cap);
    merged
}

/// A batch whose pagination was aborted
#[derive(Debug)]
pub struct BatchFailure {
    pub index: usize,
    pub query: String,
    pub error: QueryError,
}

/// Merged search results plus the batches that failed
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub repos: Vec<Repository>,
    pub failures: Vec<BatchFailure>,
}

/// Search every keyword batch in order and merge the results.
///
/// A failing batch is isolated: its partial results are dropped and the
/// failure recorded, other batches still contribute. Only when every batch
/// fails is the last error returned.
pub async fn search_repos(
    backend: &dyn SearchBackend,
    window: &SearchWindow,
    keywords: &[String],
    skip: &HashSet<String>,
) -> Result<SearchOutcome, QueryError> {
    let batches = QueryBatch::plan(keywords);
    let total = batches.len();

    let mut results = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (index, batch) in batches.iter().enumerate() {
        let query = build_query(window, batch);
        match paginate_batch(backend, &query, window.max_repos, skip, window.exclude_forks).await {
            Ok(repos) => {
                debug!(batch = index + 1, total, found = repos.len(), "batch done");
                results.push(repos);
            }
            Err(error) => {
                warn!(batch = index + 1, total, %query, %error, "search batch failed");
                failures.push(BatchFailure {
                    index,
                    query,
                    error,
                });
            }
        }
    }

    if results.is_empty() {
        if let Some(last) = failures.pop() {
            return Err(last.error);
        }
    }

    Ok(SearchOutcome {
        repos: merge_results(results, window.max_repos),
        failures,
    })
}
