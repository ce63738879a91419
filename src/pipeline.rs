//! One discovery run: search, filter, enrich, evaluate, notify, remember

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::SeenCache;
use crate::config::Config;
use crate::discord::Notifier;
use crate::github::{ReadmeSource, Repository, SearchBackend};
use crate::llm::{EvaluationResult, Evaluator};
use crate::readme::ReadmeEnricher;
use crate::search::{search_repos, SearchWindow};

pub struct Pipeline<'a> {
    pub search: &'a dyn SearchBackend,
    pub readmes: &'a dyn ReadmeSource,
    pub evaluator: &'a dyn Evaluator,
    /// `None` skips notification entirely
    pub notifier: Option<&'a dyn Notifier>,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub since: NaiveDate,
    pub dry_run: bool,
    /// Overrides `settings.min_stars` when set
    pub min_stars: Option<u64>,
    pub rejected_log: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub matched: usize,
    pub failed_batches: usize,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Processed {}, matched {}", self.processed, self.matched)?;
        if self.failed_batches > 0 {
            write!(f, " ({} batches failed)", self.failed_batches)?;
        }
        Ok(())
    }
}

impl Pipeline<'_> {
    pub async fn run(
        &self,
        config: &Config,
        prompt: &str,
        cache: &mut SeenCache,
        options: &RunOptions,
    ) -> Result<RunSummary> {
        let settings = &config.settings;
        info!(since = %options.since, "Fetching repos created since {}", options.since);

        let skip = cache.seen_ids();
        if cache.is_empty() {
            info!("Seen cache is empty");
        } else {
            info!(cached = cache.len(), "Repos in cache");
        }

        let window = SearchWindow {
            since: options.since,
            max_repos: settings.max_repos,
            exclude_forks: true,
        };
        let outcome = search_repos(self.search, &window, &config.github.keywords, &skip).await?;
        let failed_batches = outcome.failures.len();
        for failure in &outcome.failures {
            warn!(batch = failure.index + 1, query = %failure.query, error = %failure.error, "Results are missing a failed batch");
        }

        let mut repos = outcome.repos;
        info!(found = repos.len(), "Found new repositories");

        let min_stars = options.min_stars.unwrap_or(settings.min_stars);
        if min_stars > 0 {
            repos.retain(|r| r.stars >= min_stars);
            info!(min_stars, remaining = repos.len(), "Applied min_stars filter");
        }

        if !repos.is_empty() {
            info!(count = repos.len(), "Fetching READMEs");
            let enricher =
                ReadmeEnricher::new(self.readmes, settings.concurrency, options.fetch_timeout);
            let mut readmes = enricher.fetch_readmes(&repos, settings.readme_max_chars).await;
            for repo in &mut repos {
                repo.readme = readmes.remove(&repo.full_name).unwrap_or_default();
            }
        }

        let total = repos.len();
        let mut matched: Vec<(Repository, EvaluationResult)> = Vec::new();
        let mut rejected = 0;

        for (i, repo) in repos.into_iter().enumerate() {
            info!("Evaluating {}/{}: {}", i + 1, total, repo.full_name);
            let result = self.evaluator.evaluate(&repo, prompt).await;
            cache.mark_seen(&repo.full_name);

            if result.interested {
                info!(repo = %repo.full_name, reason = %result.reason, "Interested");
                matched.push((repo, result));
            } else {
                debug!(repo = %repo.full_name, reason = %result.reason, "Not interested");
                rejected += 1;
                if let Some(path) = &options.rejected_log {
                    append_rejected(path, &repo, &result.reason)?;
                }
            }
        }

        if let (Some(path), true) = (&options.rejected_log, rejected > 0) {
            info!(rejected, path = %path.display(), "Logged rejected repos");
        }
        info!(matched = matched.len(), processed = total, "Evaluation finished");

        if options.dry_run {
            info!("Dry run - not sending to Discord");
            for (repo, result) in &matched {
                println!("{}", dry_run_line(repo, result));
            }
        } else if let (Some(notifier), false) = (self.notifier, matched.is_empty()) {
            notifier.send_summary(matched.len(), total).await?;
            notifier.send_repos(&matched, settings.batch_size).await?;
            info!("Sent results to Discord");
        }

        let pruned = cache.prune(settings.cache_days);
        debug!(pruned, "Pruned seen cache");
        cache.persist()?;
        debug!(path = %cache.path().display(), entries = cache.len(), "Seen cache written");

        Ok(RunSummary {
            processed: total,
            matched: matched.len(),
            failed_batches,
        })
    }
}

pub fn dry_run_line(repo: &Repository, result: &EvaluationResult) -> String {
    format!("{} ({}⭐): {}", repo.full_name, repo.stars, result.reason)
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Rejected-log entry, kept for tuning the prompt
pub fn format_rejected(repo: &Repository, reason: &str, at: NaiveDateTime) -> String {
    let topics = repo.topics.join(", ");
    format!(
        "[{}] {} ({}⭐)\n  URL: {}\n  Description: {}\n  Language: {}\n  Topics: {}\n  Reason: {}\n\n",
        at.format("%Y-%m-%d %H:%M:%S"),
        repo.full_name,
        repo.stars,
        repo.url,
        or_na(&repo.description),
        or_na(&repo.language),
        or_na(&topics),
        reason
    )
}

fn append_rejected(path: &Path, repo: &Repository, reason: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    file.write_all(format_rejected(repo, reason, Local::now().naive_local()).as_bytes())
        .with_context(|| format!("Could not write {}", path.display()))?;
    Ok(())
}
