//! Fetch coordination — pull only what a window query is missing.
//!
//! The coordinator sits between the timeline and the isolated repository
//! store: it clones lazily, skips fetches whose window is already inside
//! the repository's fetched ranges, and reloads the post cache after
//! every successful fetch. Fetch failures are reported, never retried
//! here, and never fatal to an enclosing window query.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use gitsocial::{normalize_url, ranges_cover, split_identity, DateRange};

use crate::cache::{self, CacheRange, PostCache};
use crate::error::{Result, SocialError};
use crate::git;
use crate::social::lists;
use crate::store::repos::RepoStore;

// ─── Scopes ─────────────────────────────────────────────────────────

/// Selector naming a source of posts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Union over the workspace and every repository referenced by a
    /// followed list. Spelled `timeline` or `following`.
    Timeline,
    List(String),
    Repository(String),
    /// The workspace itself. Spelled `repository:my` or `workspace:my`.
    Workspace,
}

impl Scope {
    pub fn parse(raw: &str) -> Option<Scope> {
        match raw {
            "timeline" | "following" => Some(Scope::Timeline),
            "repository:my" | "workspace:my" => Some(Scope::Workspace),
            _ => {
                if let Some(id) = raw.strip_prefix("list:") {
                    Some(Scope::List(id.to_string()))
                } else {
                    raw.strip_prefix("repository:")
                        .map(|url| Scope::Repository(url.to_string()))
                }
            }
        }
    }
}

// ─── Batch results ──────────────────────────────────────────────────

/// Per-repository outcome of a batch fetch.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub repository: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a batch fetch. Partial progress is permitted and surfaced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FetchSummary {
    pub fetched: usize,
    pub failed: usize,
    pub outcomes: Vec<FetchOutcome>,
}

// ─── Coordinator ────────────────────────────────────────────────────

pub struct FetchCoordinator {
    store: Arc<RepoStore>,
    cache: Arc<RwLock<PostCache>>,
    /// Windows currently being fetched, keyed on `(url, since)`. A second
    /// caller for the same window returns immediately; the first fetch's
    /// range union absorbs its work.
    in_flight: Mutex<HashSet<(String, NaiveDate)>>,
}

/// Removes the in-flight marker on every exit path.
struct InFlightGuard<'a> {
    coordinator: &'a FetchCoordinator,
    key: (String, NaiveDate),
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .coordinator
            .in_flight
            .lock()
            .expect("in-flight set poisoned");
        in_flight.remove(&self.key);
    }
}

impl FetchCoordinator {
    pub fn new(store: Arc<RepoStore>, cache: Arc<RwLock<PostCache>>) -> Self {
        Self {
            store,
            cache,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<RepoStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<RwLock<PostCache>> {
        &self.cache
    }

    /// Guarantee that on success the isolated clone for `url` has been
    /// fetched at least once covering `[since, today]` and the post cache
    /// holds those posts. A window already inside the repository's
    /// fetched ranges costs no fetch.
    pub fn ensure_data_for_date_range(
        &self,
        url: &str,
        branch: Option<&str>,
        since: NaiveDate,
        persistent: bool,
    ) -> Result<()> {
        let normalized = normalize_url(url);
        let key = (normalized.clone(), since);
        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
            if !in_flight.insert(key.clone()) {
                tracing::debug!(url = %normalized, %since, "window already in flight, skipping");
                return Ok(());
            }
        }
        let _guard = InFlightGuard { coordinator: self, key };

        let freshly_cloned = !self.store.is_initialized(&normalized);
        let repo_path = self.store.ensure_initialized(&normalized)?;
        if freshly_cloned && !persistent {
            self.store.set_persistent(&normalized, false)?;
        }

        let branch = resolve_branch(&repo_path, branch);

        let config = self.store.read_config(&repo_path).map_err(|e| {
            SocialError::EnsureData { url: normalized.clone(), message: e.to_string() }
        })?;

        if ranges_cover(&config.fetched_ranges, since) {
            // No fetch needed; make sure the cache is warm after a cold start.
            let cache_is_cold = !self
                .cache
                .read()
                .expect("post cache poisoned")
                .repositories()
                .contains(&normalized);
            if cache_is_cold {
                self.load_into_cache(&repo_path, &normalized, &branch, since)?;
            }
            return Ok(());
        }

        tracing::info!(url = %normalized, %since, branch = %branch, "fetching window");
        git::fetch_since(&repo_path, "origin", &branch, Some(since))?;
        remember_branch(&repo_path, &branch);

        let today = Utc::now().date_naive();
        self.store
            .add_fetched_range(&normalized, DateRange::new(since, today))?;

        self.load_into_cache(&repo_path, &normalized, &branch, since)
    }

    /// Fetch a repository unconditionally (update path): pull from the
    /// last fetch point, union the window, reload the cache.
    pub fn refresh_repository(&self, url: &str, branch: Option<&str>) -> Result<()> {
        let normalized = normalize_url(url);
        let repo_path = self.store.ensure_initialized(&normalized)?;
        let branch = resolve_branch(&repo_path, branch);

        let config = self.store.read_config(&repo_path)?;
        let since = config
            .last_fetch
            .map(|t| t.date_naive())
            .unwrap_or_else(|| Utc::now().date_naive() - chrono::Days::new(7));

        git::fetch_since(&repo_path, "origin", &branch, Some(since))?;
        remember_branch(&repo_path, &branch);

        let today = Utc::now().date_naive();
        self.store
            .add_fetched_range(&normalized, DateRange::new(since, today))?;
        self.load_into_cache(&repo_path, &normalized, &branch, since)
    }

    /// Batch fetch over a scope. No atomicity: every repository is tried,
    /// failures are collected, the summary carries both counts.
    pub fn fetch_updates(&self, workdir: &Path, scope: &Scope) -> Result<FetchSummary> {
        let targets = self.scope_repositories(workdir, scope)?;

        let mut summary = FetchSummary::default();
        for identity in targets {
            let (url, branch) = split_identity(&identity);
            match self.refresh_repository(&url, branch.as_deref()) {
                Ok(()) => {
                    summary.fetched += 1;
                    summary.outcomes.push(FetchOutcome {
                        repository: url,
                        ok: true,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "repository fetch failed");
                    summary.failed += 1;
                    summary.outcomes.push(FetchOutcome {
                        repository: url,
                        ok: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if let Scope::Timeline | Scope::Workspace = scope {
            stamp_workspace_fetch(workdir);
        }
        Ok(summary)
    }

    /// The repository identities a scope expands to. The workspace scope
    /// is empty here — workspace posts never need an isolated clone.
    pub fn scope_repositories(&self, workdir: &Path, scope: &Scope) -> Result<Vec<String>> {
        match scope {
            Scope::Workspace => Ok(Vec::new()),
            Scope::Repository(url) => Ok(vec![url.clone()]),
            Scope::List(id) => {
                let list = lists::get(workdir, id)?
                    .ok_or_else(|| SocialError::ListNotFound(id.clone()))?;
                Ok(list.repositories)
            }
            Scope::Timeline => lists::following_repositories(workdir),
        }
    }

    /// Rebuild cache entries per a refresh selector.
    pub fn refresh_cache(
        &self,
        workdir: &Path,
        all: bool,
        repositories: &[String],
        list_ids: &[String],
    ) -> Result<()> {
        let mut targets: Vec<String> = Vec::new();

        if all {
            for (url, _) in self.store.known_repositories()? {
                targets.push(url);
            }
        } else {
            targets.extend(repositories.iter().map(|u| normalize_url(u)));
            for id in list_ids {
                if id == "*" {
                    targets.extend(lists::following_repositories(workdir)?);
                } else if let Some(list) = lists::get(workdir, id)? {
                    targets.extend(list.repositories);
                }
            }
        }

        targets.sort();
        targets.dedup();

        for identity in targets {
            let (url, branch) = split_identity(&identity);
            let normalized = normalize_url(&url);
            if !self.store.is_initialized(&normalized) {
                continue;
            }
            let repo_path = self.store.repo_path(&normalized);
            let branch = resolve_branch(&repo_path, branch.as_deref());
            let config = self.store.read_config(&repo_path)?;
            let since = config
                .fetched_ranges
                .first()
                .map(|r| r.start)
                .unwrap_or_else(|| Utc::now().date_naive() - chrono::Days::new(7));
            self.load_into_cache(&repo_path, &normalized, &branch, since)?;
        }
        Ok(())
    }

    fn load_into_cache(
        &self,
        repo_path: &Path,
        repository: &str,
        branch: &str,
        since: NaiveDate,
    ) -> Result<()> {
        let reference = format!("origin/{}", branch);
        let window = git::LogWindow { since: Some(since), ..Default::default() };
        let posts = cache::load_repository_posts(
            repo_path, &reference, repository, false, false, &window,
        )
        .map_err(|e| SocialError::EnsureData {
            url: repository.to_string(),
            message: e.to_string(),
        })?;

        let loaded = posts.len();
        let mut cache = self.cache.write().expect("post cache poisoned");
        cache.insert_posts(repository, posts);
        let start = since.and_hms_opt(0, 0, 0).expect("midnight exists").and_utc();
        cache.add_covered_range(CacheRange::new(start, Utc::now()));
        tracing::debug!(repository, loaded, "cache entry reloaded");
        Ok(())
    }
}

/// Branch to fetch for a clone: explicit request, then the branch the
/// clone was last fetched with, then the remote's usual suspects.
fn resolve_branch(repo_path: &Path, requested: Option<&str>) -> String {
    if let Some(branch) = requested {
        return branch.to_string();
    }
    if let Ok(Some(branch)) = git::config_get(repo_path, "gitsocial.branch") {
        return branch;
    }
    for branch in ["main", "master", "develop", "trunk"] {
        let remote = format!("origin/{}", branch);
        if matches!(git::rev_parse(repo_path, &remote), Ok(Some(_))) {
            return branch.to_string();
        }
    }
    git::detect_default_branch(repo_path)
}

/// Persist the fetched branch so later cache rebuilds walk the same ref.
fn remember_branch(repo_path: &Path, branch: &str) {
    if let Err(e) = git::config_set(repo_path, "gitsocial.branch", branch) {
        tracing::debug!(error = %e, "could not remember clone branch");
    }
}

/// Record the workspace-level fetch time (`remote.origin.gitsocial-lastfetch`).
/// Bookkeeping only; failures are logged and swallowed.
fn stamp_workspace_fetch(workdir: &Path) {
    let now = Utc::now().to_rfc3339();
    if let Err(e) = git::config_set(workdir, "remote.origin.gitsocial-lastfetch", &now) {
        tracing::debug!(error = %e, "could not stamp workspace fetch time");
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
