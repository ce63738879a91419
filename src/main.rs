mod cache;
mod config;
mod discord;
mod error;
mod github;
mod llm;
mod pipeline;
mod readme;
mod search;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cache::SeenCache;
use config::Config;
use discord::{DiscordNotifier, Notifier};
use github::GitHubClient;
use pipeline::{Pipeline, RunOptions, RunSummary};

#[derive(Parser)]
#[command(name = "repo-scout")]
#[command(about = "Discover interesting new GitHub projects")]
#[command(after_help = "\x1b[36mExamples:\x1b[0m
  repo-scout --dry-run             # Print matches instead of posting
  repo-scout --since 7d            # Repos created in the last week
  repo-scout --since 2024-12-10    # Repos created after a date")]
struct Cli {
    /// Show results without posting to Discord
    #[arg(long)]
    dry_run: bool,

    /// Time range: relative (12h, 7d, 1m) or ISO date (YYYY-MM-DD). Default: yesterday
    #[arg(long)]
    since: Option<String>,

    /// Path to config file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Path to the interests prompt
    #[arg(long, default_value = "prompt.md")]
    prompt: PathBuf,

    /// Path to the seen-repos cache
    #[arg(long, default_value = "seen_repos.json")]
    cache: PathBuf,

    /// Path to the rejected repos log
    #[arg(long, default_value = "rejected_repos.log")]
    rejected_log: PathBuf,

    /// Minimum stars required (overrides config)
    #[arg(long)]
    min_stars: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli).await {
        Ok(summary) => {
            info!("Done! {}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<RunSummary> {
    let config = Config::load(&cli.config)?;
    let prompt = config::load_prompt(&cli.prompt)?;

    let now = chrono::Local::now().naive_local();
    let since = match &cli.since {
        Some(value) => {
            let since = config::parse_since(value, now)?;
            info!("Using date filter: {}", since);
            since
        }
        None => config::default_since(now),
    };

    let evaluator = llm::create_evaluator(&config.llm.provider, &config.llm.model, &config.llm.api_key)?;
    let github = GitHubClient::new(config.github.token.clone())?;
    let discord = if cli.dry_run {
        None
    } else {
        Some(DiscordNotifier::new(config.webhook_url()?.to_string())?)
    };

    let pipeline = Pipeline {
        search: &github,
        readmes: &github,
        evaluator: evaluator.as_ref(),
        notifier: discord.as_ref().map(|d| d as &dyn Notifier),
    };
    let options = RunOptions {
        since,
        dry_run: cli.dry_run,
        min_stars: cli.min_stars,
        rejected_log: Some(cli.rejected_log.clone()),
        fetch_timeout: readme::DEFAULT_FETCH_TIMEOUT,
    };

    let mut cache = SeenCache::load(&cli.cache);
    pipeline.run(&config, &prompt, &mut cache, &options).await
}
