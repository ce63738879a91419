//! Seen-repository cache with TTL pruning
//!
//! Persisted as a JSON object mapping `owner/name` to the ISO date it was
//! last processed. Writes go through a temp file and an atomic rename.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct SeenCache {
    path: PathBuf,
    entries: HashMap<String, NaiveDate>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl SeenCache {
    /// Load the cache from `path`.
    ///
    /// A missing file starts an empty cache. Unreadable or corrupt content
    /// is logged and also starts empty; it is overwritten on the next persist.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, NaiveDate>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Seen cache is corrupt, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read seen cache, starting empty");
                HashMap::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "Loaded seen cache");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_seen(&self, full_name: &str) -> bool {
        self.entries.contains_key(full_name)
    }

    /// Snapshot of every identifier, used as the search skip-set
    pub fn seen_ids(&self) -> HashSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Record `full_name` as seen today, replacing any older date
    pub fn mark_seen(&mut self, full_name: &str) {
        self.mark_seen_on(full_name, today());
    }

    pub fn mark_seen_on(&mut self, full_name: &str, date: NaiveDate) {
        self.entries.insert(full_name.to_string(), date);
    }

    /// Drop entries last seen more than `ttl_days` ago. Returns how many went.
    pub fn prune(&mut self, ttl_days: u32) -> usize {
        self.prune_at(ttl_days, today())
    }

    /// Entries dated exactly `today - ttl_days` are kept. A window reaching
    /// past the earliest representable date keeps everything.
    pub fn prune_at(&mut self, ttl_days: u32, today: NaiveDate) -> usize {
        let Some(cutoff) = chrono::Duration::try_days(i64::from(ttl_days))
            .and_then(|ttl| today.checked_sub_signed(ttl))
        else {
            return 0;
        };
        let before = self.entries.len();
        self.entries.retain(|_, seen| *seen >= cutoff);
        before - self.entries.len()
    }

    /// Write the full cache, replacing the previous file atomically
    pub fn persist(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;

        let sorted: BTreeMap<&String, &NaiveDate> = self.entries.iter().collect();
        let json = serde_json::to_string_pretty(&sorted).context("Failed to serialize seen cache")?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("Could not create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Could not replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Saved seen cache");
        Ok(())
    }
}
