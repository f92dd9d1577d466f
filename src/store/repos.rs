//! Isolated repository store — per-URL clones under the storage root.
//!
//! Every external repository gets a private clone in
//! `<storage_root>/repositories/<slug(url)>/`, separate from the user's
//! workspace. Fetch bookkeeping (`gitsocial.lastfetch`,
//! `gitsocial.fetchedranges`) lives in the clone's own git config.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use gitsocial::{add_range, normalize_url, repo_slug, DateRange};

use crate::error::{Result, SocialError};
use crate::git;

/// Default storage root for isolated clones: `<data_local_dir>/gitsocial`.
pub fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gitsocial")
}

/// Config key holding the normalized origin URL (slug inverse).
const KEY_URL: &str = "gitsocial.url";
const KEY_LAST_FETCH: &str = "gitsocial.lastfetch";
const KEY_FETCHED_RANGES: &str = "gitsocial.fetchedranges";
const KEY_PERSISTENT: &str = "gitsocial.persistent";

/// Per-clone fetch bookkeeping as read from git config.
#[derive(Clone, Debug, Default)]
pub struct RepoConfig {
    pub last_fetch: Option<DateTime<Utc>>,
    pub fetched_ranges: Vec<DateRange>,
    /// Clones of followed lists are persistent; ad-hoc views are
    /// eligible for GC by an external cleaner.
    pub persistent: bool,
}

/// Manages isolated clones under a storage root.
///
/// Config read-modify-write cycles are guarded by a per-repository lock
/// so concurrent coordinators cannot interleave range updates.
pub struct RepoStore {
    storage_root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RepoStore {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    fn repositories_dir(&self) -> PathBuf {
        self.storage_root.join("repositories")
    }

    /// Directory of the isolated clone for a URL (whether or not it exists).
    pub fn repo_path(&self, url: &str) -> PathBuf {
        self.repositories_dir().join(repo_slug(url))
    }

    pub fn is_initialized(&self, url: &str) -> bool {
        self.repo_path(url).join(".git").exists()
    }

    fn lock_for(&self, url: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("repo lock table poisoned");
        locks
            .entry(normalize_url(url))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Clone lazily on first access; subsequent calls return the existing
    /// path. Stamps the normalized URL into the clone's config so the
    /// slug directory can be mapped back.
    pub fn ensure_initialized(&self, url: &str) -> Result<PathBuf> {
        let lock = self.lock_for(url);
        let _guard = lock.lock().expect("repo lock poisoned");

        let path = self.repo_path(url);
        if path.join(".git").exists() {
            return Ok(path);
        }

        let normalized = normalize_url(url);
        tracing::info!(url = %normalized, path = %path.display(), "initializing isolated clone");
        git::clone(&normalized, &path)?;
        git::config_set(&path, KEY_URL, &normalized)?;
        Ok(path)
    }

    /// Read fetch bookkeeping. Unparseable values degrade to defaults;
    /// the commit graph, not the config, is the source of truth.
    pub fn read_config(&self, repo_path: &Path) -> Result<RepoConfig> {
        let last_fetch = git::config_get(repo_path, KEY_LAST_FETCH)?
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc));

        let fetched_ranges = git::config_get(repo_path, KEY_FETCHED_RANGES)?
            .and_then(|s| serde_json::from_str::<Vec<DateRange>>(&s).ok())
            .unwrap_or_default();

        let persistent = git::config_get(repo_path, KEY_PERSISTENT)?
            .map(|s| s == "true")
            .unwrap_or(true);

        Ok(RepoConfig {
            last_fetch,
            fetched_ranges,
            persistent,
        })
    }

    /// Persist fetch bookkeeping back into the clone's config.
    pub fn update_config(&self, repo_path: &Path, config: &RepoConfig) -> Result<()> {
        if let Some(last_fetch) = config.last_fetch {
            git::config_set(repo_path, KEY_LAST_FETCH, &last_fetch.to_rfc3339())?;
        }
        let ranges = serde_json::to_string(&config.fetched_ranges)?;
        git::config_set(repo_path, KEY_FETCHED_RANGES, &ranges)?;
        git::config_set(
            repo_path,
            KEY_PERSISTENT,
            if config.persistent { "true" } else { "false" },
        )?;
        Ok(())
    }

    /// Union a freshly fetched window into the clone's ranges, coalescing
    /// touching intervals, and stamp `lastFetch`. Returns the new union.
    pub fn add_fetched_range(&self, url: &str, range: DateRange) -> Result<Vec<DateRange>> {
        let lock = self.lock_for(url);
        let _guard = lock.lock().expect("repo lock poisoned");

        let path = self.repo_path(url);
        let mut config = self.read_config(&path)?;
        add_range(&mut config.fetched_ranges, range);
        config.last_fetch = Some(Utc::now());
        self.update_config(&path, &config)?;
        Ok(config.fetched_ranges)
    }

    /// Mark a clone persistent (list member) or GC-eligible (ad-hoc view).
    pub fn set_persistent(&self, url: &str, persistent: bool) -> Result<()> {
        let path = self.repo_path(url);
        if !path.join(".git").exists() {
            return Err(SocialError::Repo(format!("no isolated clone for '{}'", url)));
        }
        git::config_set(&path, KEY_PERSISTENT, if persistent { "true" } else { "false" })
    }

    /// All initialized clones as `(normalized_url, path)` pairs. Clones
    /// missing the URL stamp are skipped.
    pub fn known_repositories(&self) -> Result<Vec<(String, PathBuf)>> {
        let dir = self.repositories_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut repos = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.join(".git").exists() {
                continue;
            }
            match git::config_get(&path, KEY_URL) {
                Ok(Some(url)) => repos.push((url, path)),
                Ok(None) => {
                    tracing::warn!(path = %path.display(), "clone without URL stamp, skipping")
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "unreadable clone"),
            }
        }
        repos.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(repos)
    }

    /// Remove every clone marked non-persistent (ad-hoc views whose list
    /// membership never materialized). Returns the number removed.
    pub fn cleanup_collectable(&self) -> Result<usize> {
        let mut removed = 0;
        for (url, path) in self.known_repositories()? {
            let config = self.read_config(&path)?;
            if config.persistent {
                continue;
            }
            tracing::info!(url = %url, path = %path.display(), "removing collectable clone");
            std::fs::remove_dir_all(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Drop an isolated clone from disk.
    pub fn remove(&self, url: &str) -> Result<()> {
        let lock = self.lock_for(url);
        let _guard = lock.lock().expect("repo lock poisoned");

        let path = self.repo_path(url);
        if path.exists() {
            std::fs::remove_dir_all(&path)?;
        }
        Ok(())
    }
}
