use chrono::{Months, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: String,
    /// Empty selects the provider's default model
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_repos: usize,
    pub readme_max_chars: usize,
    /// Embeds per Discord message
    pub batch_size: usize,
    /// Seen-cache retention in days
    pub cache_days: u32,
    /// 0 disables the filter
    pub min_stars: u64,
    /// Concurrent README fetches
    pub concurrency: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_repos: 1000,
            readme_max_chars: 500,
            batch_size: 10,
            cache_days: 30,
            min_stars: 0,
            concurrency: 10,
        }
    }
}

impl Config {
    /// Load and validate the JSON config at `path`.
    ///
    /// An empty `github.token` is filled from the environment or the gh CLI.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, github_token)
    }

    fn load_with(
        path: &Path,
        discover_token: impl FnOnce() -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut config: Config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.github.token.trim().is_empty() {
            config.github.token = discover_token().ok_or(ConfigError::Missing("github.token"))?;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.provider.is_empty() {
            return Err(ConfigError::Missing("llm.provider"));
        }
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::Missing("llm.api_key"));
        }
        if self.settings.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "settings.batch_size",
                reason: "must be greater than 0".into(),
            });
        }
        if self.settings.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "settings.concurrency",
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }

    /// Webhook to post to; only required when results are actually sent
    pub fn webhook_url(&self) -> Result<&str, ConfigError> {
        if self.discord.webhook_url.is_empty() {
            Err(ConfigError::Missing("discord.webhook_url"))
        } else {
            Ok(&self.discord.webhook_url)
        }
    }
}

/// Get GitHub token from environment or gh CLI config
pub fn github_token() -> Option<String> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.is_empty() {
                return Some(token);
            }
        }
    }

    let output = std::process::Command::new("gh")
        .args(["auth", "token"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!token.is_empty()).then_some(token)
}

/// Read the user's interests prompt
pub fn load_prompt(path: &Path) -> Result<String, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let prompt = raw.trim();
    if prompt.is_empty() {
        return Err(ConfigError::Invalid {
            field: "prompt",
            reason: format!("{} is empty", path.display()),
        });
    }
    Ok(prompt.to_string())
}

/// Resolve `--since` to a calendar date.
///
/// Accepts `12h`, `7d`, `1m` (calendar months) relative to `now`, or an
/// ISO `YYYY-MM-DD` date.
pub fn parse_since(value: &str, now: NaiveDateTime) -> Result<NaiveDate, ConfigError> {
    let invalid = || ConfigError::InvalidSince(value.to_string());
    let lower = value.trim().to_ascii_lowercase();

    if let Some(unit) = lower.chars().last().filter(|c| matches!(c, 'h' | 'd' | 'm')) {
        let amount = &lower[..lower.len() - 1];
        if !amount.is_empty() && amount.bytes().all(|b| b.is_ascii_digit()) {
            let amount: u32 = amount.parse().map_err(|_| invalid())?;
            let then = match unit {
                'h' => chrono::Duration::try_hours(i64::from(amount))
                    .and_then(|d| now.checked_sub_signed(d)),
                'd' => chrono::Duration::try_days(i64::from(amount))
                    .and_then(|d| now.checked_sub_signed(d)),
                _ => now.checked_sub_months(Months::new(amount)),
            };
            return then.map(|t| t.date()).ok_or_else(invalid);
        }
    }

    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| invalid())
}

/// Yesterday, used when `--since` is omitted
pub fn default_since(now: NaiveDateTime) -> NaiveDate {
    let today = now.date();
    today.pred_opt().unwrap_or(today)
}
