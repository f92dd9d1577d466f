//! Timeline assembly — window queries over a scope of repositories.
//!
//! The hot path is [`TimelineService::get_week_posts`]: make sure the
//! week's data is locally available (fetching only what the fetched
//! ranges do not already cover), answer from the post cache, and warm
//! the adjacent weeks in the background. A single repository's fetch
//! failure never takes the week down; its cached posts still appear.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Days, Utc};
use serde::Serialize;

use gitsocial::{normalize_url, split_identity};

use crate::cache::{self, Post};
use crate::error::Result;
use crate::fetch::{FetchCoordinator, FetchOutcome, Scope};
use crate::git::LogWindow;
use crate::protocol::PostType;
use crate::social;

// ─── Options & results ──────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct WeekOptions {
    pub scope: Scope,
    /// Post types to include; `None` means all.
    pub types: Option<Vec<PostType>>,
    /// Ensure missing data is fetched before answering. Off = cache-only.
    pub fetch: bool,
    /// Warm the adjacent weeks in the background after answering.
    pub prefetch: bool,
}

impl Default for WeekOptions {
    fn default() -> Self {
        Self {
            scope: Scope::Timeline,
            types: None,
            fetch: true,
            prefetch: true,
        }
    }
}

/// One answered window query.
#[derive(Clone, Debug, Serialize)]
pub struct WeekPosts {
    pub posts: Vec<Post>,
    /// Per-repository fetch outcomes for this query (empty when the
    /// query was served entirely from cache).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<FetchOutcome>,
}

/// Aggregate statistics over a set of timeline entries.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineStats {
    pub total_posts: usize,
    pub posts_by_type: HashMap<String, usize>,
    /// Keyed by author email.
    pub posts_by_author: HashMap<String, usize>,
    pub posts_by_repository: HashMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

// ─── Service ────────────────────────────────────────────────────────

/// The workspace's repository identity: the origin URL when one is
/// configured, the directory path otherwise.
pub fn workspace_identity(workdir: &Path) -> String {
    match crate::git::config_get(workdir, "remote.origin.url") {
        Ok(Some(url)) => normalize_url(&url),
        _ => workdir.to_string_lossy().into_owned(),
    }
}

pub struct TimelineService {
    coordinator: Arc<FetchCoordinator>,
}

impl TimelineService {
    pub fn new(coordinator: Arc<FetchCoordinator>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.coordinator
    }

    /// Answer a week window query for a scope.
    pub fn get_week_posts(
        &self,
        workdir: &Path,
        week_start: DateTime<Utc>,
        week_end: DateTime<Utc>,
        opts: &WeekOptions,
    ) -> Result<WeekPosts> {
        let candidates = self
            .coordinator
            .scope_repositories(workdir, &opts.scope)?;

        // Clones backing lists and the timeline stay; ad-hoc repository
        // views are eligible for GC.
        let persistent = !matches!(opts.scope, Scope::Repository(_));

        let mut outcomes = Vec::new();
        if opts.fetch {
            outcomes = self.ensure_week_data(&candidates, week_start, persistent);
        }

        // Workspace posts are local; reload them whenever the scope
        // includes the workspace so fresh commits appear immediately.
        let mut keys: Vec<String> = Vec::new();
        if matches!(opts.scope, Scope::Timeline | Scope::Workspace) {
            keys.push(self.reload_workspace(workdir)?);
        }
        keys.extend(candidates.iter().map(|identity| {
            let (url, _) = split_identity(identity);
            normalize_url(&url)
        }));

        let posts = {
            let cache = self.coordinator.cache().read().expect("post cache poisoned");
            cache.window_posts(Some(&keys), week_start, week_end, opts.types.as_deref())
        };

        if opts.prefetch {
            // Fire-and-forget; the handle is intentionally not awaited.
            let _ = self.prefetch_adjacent_weeks(workdir, week_start, &opts.scope);
        }

        Ok(WeekPosts { posts, repositories: outcomes })
    }

    /// Make each candidate repository's data available for the week.
    /// Failures are collected, logged, and never fatal.
    fn ensure_week_data(
        &self,
        candidates: &[String],
        week_start: DateTime<Utc>,
        persistent: bool,
    ) -> Vec<FetchOutcome> {
        let since = week_start.date_naive();
        let mut outcomes = Vec::with_capacity(candidates.len());

        for identity in candidates {
            let (url, branch) = split_identity(identity);
            match self
                .coordinator
                .ensure_data_for_date_range(&url, branch.as_deref(), since, persistent)
            {
                Ok(()) => outcomes.push(FetchOutcome {
                    repository: normalize_url(&url),
                    ok: true,
                    error: None,
                }),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "week data fetch failed, serving cache");
                    outcomes.push(FetchOutcome {
                        repository: normalize_url(&url),
                        ok: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        outcomes
    }

    /// Reload the workspace's posts into the cache; returns the cache key.
    fn reload_workspace(&self, workdir: &Path) -> Result<String> {
        let identity = workspace_identity(workdir);
        let branch = social::social_branch(workdir);
        let is_origin = matches!(
            crate::git::config_get(workdir, "remote.origin.url"),
            Ok(Some(_))
        );

        // A workspace without any commit on the social branch is an empty
        // timeline, not an error.
        let posts = if crate::git::rev_parse(workdir, &branch)?.is_some() {
            cache::load_repository_posts(
                workdir,
                &branch,
                &identity,
                true,
                is_origin,
                &LogWindow::default(),
            )?
        } else {
            Vec::new()
        };

        let mut cache = self.coordinator.cache().write().expect("post cache poisoned");
        cache.set_workspace_key(&identity);
        cache.insert_posts(&identity, posts);
        Ok(identity)
    }

    /// Warm the cache for `week_start ± 7 days` on a background thread.
    /// Errors are logged and swallowed; callers must not wait for this.
    pub fn prefetch_adjacent_weeks(
        &self,
        workdir: &Path,
        week_start: DateTime<Utc>,
        scope: &Scope,
    ) -> thread::JoinHandle<()> {
        let coordinator = Arc::clone(&self.coordinator);
        let workdir: PathBuf = workdir.to_path_buf();
        let scope = scope.clone();

        thread::spawn(move || {
            let candidates = match coordinator.scope_repositories(&workdir, &scope) {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::debug!(error = %e, "prefetch scope resolution failed");
                    return;
                }
            };

            let previous = week_start - Days::new(7);
            let next = week_start + Days::new(7);
            for since in [previous.date_naive(), next.date_naive()] {
                for identity in &candidates {
                    let (url, branch) = split_identity(identity);
                    if let Err(e) =
                        coordinator.ensure_data_for_date_range(&url, branch.as_deref(), since, true)
                    {
                        tracing::debug!(url = %url, %since, error = %e, "adjacent-week prefetch failed");
                    }
                }
            }
        })
    }

    /// Substring search over cached posts (content, clean content, author
    /// name and email), newest first.
    pub fn search_posts(&self, query: &str, max_results: usize) -> Vec<Post> {
        let needle = query.to_lowercase();
        let cache = self.coordinator.cache().read().expect("post cache poisoned");

        let mut hits: Vec<Post> = Vec::new();
        for repo in cache.repositories() {
            for post in cache.posts_for(&repo) {
                let matches = post.clean_content.to_lowercase().contains(&needle)
                    || post.content.to_lowercase().contains(&needle)
                    || post.author.name.to_lowercase().contains(&needle)
                    || post.author.email.to_lowercase().contains(&needle);
                if matches {
                    hits.push(post.clone());
                }
            }
        }

        hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hits.dedup_by(|a, b| a.id == b.id);
        if max_results > 0 {
            hits.truncate(max_results);
        }
        hits
    }
}

// ─── Statistics ─────────────────────────────────────────────────────

pub fn get_timeline_stats(entries: &[Post]) -> TimelineStats {
    let mut stats = TimelineStats {
        total_posts: entries.len(),
        ..Default::default()
    };

    for post in entries {
        *stats
            .posts_by_type
            .entry(post.post_type.as_str().to_string())
            .or_default() += 1;
        *stats
            .posts_by_author
            .entry(post.author.email.clone())
            .or_default() += 1;
        *stats
            .posts_by_repository
            .entry(post.repository.clone())
            .or_default() += 1;
    }

    let min = entries.iter().map(|p| p.timestamp).min();
    let max = entries.iter().map(|p| p.timestamp).max();
    if let (Some(min), Some(max)) = (min, max) {
        stats.date_range = Some((min, max));
    }

    stats
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod tests;
