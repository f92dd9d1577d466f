//! Post cache — in-memory index of posts keyed by repository identity.
//!
//! The cache is an accelerator: correctness always rests on the commit
//! graph, so anything here can be dropped and rebuilt. Window queries are
//! answered from memory; covered ranges record which spans have been
//! loaded so the timeline can skip redundant fetches.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::git::{self, CommitEntry, LogWindow};
use crate::protocol::{self, PostType};

/// Default bound on cached posts before eviction kicks in.
pub const DEFAULT_CACHE_LIMIT: usize = 100_000;

// ─── Post projection ────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interactions {
    pub comments: usize,
    pub reposts: usize,
    pub quotes: usize,
}

/// Whether the commit carried a GitMsg header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostSource {
    Explicit,
    Implicit,
}

/// A post, materialized on demand from a commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// `#commit:<12-hex>` — globally unique as far as the hash prefix is.
    pub id: String,
    /// Normalized repository identity the commit came from.
    pub repository: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
    /// Raw commit message.
    pub content: String,
    /// Message with protocol framing stripped.
    pub clean_content: String,
    #[serde(rename = "type")]
    pub post_type: PostType,
    pub source: PostSource,
    pub interactions: Interactions,
    pub is_unpushed: bool,
    pub is_workspace_post: bool,
    pub is_origin: bool,
    /// Commit-form targets of this post's references, for interaction
    /// counting. Not part of the wire shape.
    #[serde(skip)]
    pub ref_targets: Vec<String>,
}

impl Post {
    /// Project a commit into a post. Commits without a GitMsg header are
    /// surfaced as implicit plain posts.
    pub fn from_commit(
        entry: &CommitEntry,
        repository: &str,
        is_workspace_post: bool,
        is_origin: bool,
        unpushed: &HashSet<String>,
    ) -> Post {
        let message = protocol::parse_message(&entry.message);
        let post_type = protocol::post_type(message.as_ref());
        let source = if message.is_some() {
            PostSource::Explicit
        } else {
            PostSource::Implicit
        };

        let ref_targets = message
            .as_ref()
            .map(|m| {
                m.references
                    .iter()
                    .filter(|r| r.ext == protocol::SOCIAL_EXT)
                    .filter_map(|r| r.commit_hash())
                    .map(|hash| format!("#commit:{}", hash))
                    .collect()
            })
            .unwrap_or_default();

        let short = entry.short_hash();
        Post {
            id: format!("#commit:{}", short),
            repository: repository.to_string(),
            author: Author {
                name: entry.author_name.clone(),
                email: entry.author_email.clone(),
            },
            timestamp: entry.timestamp,
            content: entry.message.clone(),
            clean_content: protocol::clean_content(&entry.message),
            post_type,
            source,
            interactions: Interactions::default(),
            is_unpushed: unpushed.contains(short),
            is_workspace_post,
            is_origin,
            ref_targets,
        }
    }
}

// ─── Covered ranges ─────────────────────────────────────────────────

/// A covered timestamp span in the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CacheRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    fn overlaps(&self, other: &CacheRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Union a span into the covered set, merging overlaps.
fn add_covered(ranges: &mut Vec<CacheRange>, new: CacheRange) {
    let mut merged = new;
    let mut kept: Vec<CacheRange> = Vec::with_capacity(ranges.len() + 1);
    for range in ranges.drain(..) {
        if range.overlaps(&merged) {
            merged = CacheRange::new(merged.start.min(range.start), merged.end.max(range.end));
        } else {
            kept.push(range);
        }
    }
    kept.push(merged);
    kept.sort_by_key(|r| r.start);
    *ranges = kept;
}

/// Subtract a closed span from the covered set (used after eviction).
/// Remainders stop one second short of the removed span — commit
/// timestamps have second granularity.
fn remove_covered(ranges: &mut Vec<CacheRange>, gone: CacheRange) {
    let step = chrono::Duration::seconds(1);
    let mut kept = Vec::with_capacity(ranges.len() + 1);
    for range in ranges.drain(..) {
        if !range.overlaps(&gone) {
            kept.push(range);
            continue;
        }
        if range.start < gone.start {
            kept.push(CacheRange::new(range.start, gone.start - step));
        }
        if gone.end < range.end {
            kept.push(CacheRange::new(gone.end + step, range.end));
        }
    }
    *ranges = kept;
}

// ─── Cache ──────────────────────────────────────────────────────────

/// Scope selector for cache clearing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClearScope {
    /// Everything.
    All,
    /// All non-workspace repositories.
    Following,
    /// One repository by normalized URL.
    Repository(String),
}

pub struct PostCache {
    /// Repository identity → posts ordered by ascending timestamp.
    posts: HashMap<String, Vec<Post>>,
    covered: Vec<CacheRange>,
    max_posts: usize,
    /// Identity of the workspace entry, exempt from `Following` clears.
    workspace_key: Option<String>,
}

impl Default for PostCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_LIMIT)
    }
}

impl PostCache {
    pub fn new(max_posts: usize) -> Self {
        Self {
            posts: HashMap::new(),
            covered: Vec::new(),
            max_posts: max_posts.max(1),
            workspace_key: None,
        }
    }

    pub fn set_workspace_key(&mut self, key: &str) {
        self.workspace_key = Some(key.to_string());
    }

    pub fn total_posts(&self) -> usize {
        self.posts.values().map(Vec::len).sum()
    }

    pub fn repositories(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.posts.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Replace a repository's entry wholesale, re-sorting and re-counting
    /// interactions, then enforcing the size bound.
    pub fn insert_posts(&mut self, repository: &str, mut posts: Vec<Post>) {
        posts.sort_by_key(|p| p.timestamp);
        self.posts.insert(repository.to_string(), posts);
        self.recount_interactions();
        self.evict_to_limit();
    }

    pub fn posts_for(&self, repository: &str) -> &[Post] {
        self.posts.get(repository).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All posts with a timestamp inside `[start, end]` whose type is in
    /// `types` (all types when absent), merged across `repositories`
    /// (every entry when absent), deduplicated by id, newest first.
    pub fn window_posts(
        &self,
        repositories: Option<&[String]>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        types: Option<&[PostType]>,
    ) -> Vec<Post> {
        let mut seen = HashSet::new();
        let mut result: Vec<Post> = Vec::new();

        let mut select = |posts: &[Post]| {
            for post in posts {
                if post.timestamp < start || post.timestamp > end {
                    continue;
                }
                if let Some(types) = types {
                    if !types.contains(&post.post_type) {
                        continue;
                    }
                }
                if seen.insert(post.id.clone()) {
                    result.push(post.clone());
                }
            }
        };

        match repositories {
            Some(keys) => {
                for key in keys {
                    if let Some(posts) = self.posts.get(key) {
                        select(posts);
                    }
                }
            }
            None => {
                for posts in self.posts.values() {
                    select(posts);
                }
            }
        }

        result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        result
    }

    // ─── Covered ranges ─────────────────────────────────────────────

    pub fn add_covered_range(&mut self, range: CacheRange) {
        add_covered(&mut self.covered, range);
    }

    pub fn is_cache_range_covered(&self, at: DateTime<Utc>) -> bool {
        self.covered.iter().any(|r| r.contains(at))
    }

    pub fn get_cached_ranges(&self) -> Vec<CacheRange> {
        self.covered.clone()
    }

    // ─── Clearing ───────────────────────────────────────────────────

    pub fn clear(&mut self, scope: &ClearScope) {
        match scope {
            ClearScope::All => {
                self.posts.clear();
                self.covered.clear();
            }
            ClearScope::Following => {
                let keep = self.workspace_key.clone();
                self.posts.retain(|key, _| Some(key) == keep.as_ref());
                if self.posts.is_empty() {
                    self.covered.clear();
                }
            }
            ClearScope::Repository(url) => {
                self.posts.remove(url);
            }
        }
    }

    // ─── Interaction counting ───────────────────────────────────────

    /// Recount interactions: one hop over every known post's references.
    /// A post's comment count is the number of known posts whose single
    /// reference points at it with `type="comment"`, likewise for
    /// reposts and quotes.
    pub fn recount_interactions(&mut self) {
        let mut counts: HashMap<String, Interactions> = HashMap::new();

        for posts in self.posts.values() {
            for post in posts {
                let Some(target) = post.ref_targets.first() else {
                    continue;
                };
                let entry = counts.entry(target.clone()).or_default();
                match post.post_type {
                    PostType::Comment => entry.comments += 1,
                    PostType::Repost => entry.reposts += 1,
                    PostType::Quote => entry.quotes += 1,
                    PostType::Post => {}
                }
            }
        }

        for posts in self.posts.values_mut() {
            for post in posts.iter_mut() {
                post.interactions = counts.get(&post.id).copied().unwrap_or_default();
            }
        }
    }

    // ─── Eviction ───────────────────────────────────────────────────

    /// Evict oldest posts across all repositories until the bound holds.
    /// The evicted timestamp span drops out of the covered ranges.
    fn evict_to_limit(&mut self) {
        let total = self.total_posts();
        if total <= self.max_posts {
            return;
        }
        let excess = total - self.max_posts;

        let mut timestamps: Vec<DateTime<Utc>> = self
            .posts
            .values()
            .flat_map(|posts| posts.iter().map(|p| p.timestamp))
            .collect();
        timestamps.sort();

        let oldest = timestamps[0];
        let cutoff = timestamps[excess - 1];

        for posts in self.posts.values_mut() {
            posts.retain(|p| p.timestamp > cutoff);
        }
        self.posts.retain(|_, posts| !posts.is_empty());

        remove_covered(&mut self.covered, CacheRange::new(oldest, cutoff));
        // Evicted interactions no longer count toward their targets.
        self.recount_interactions();
        tracing::debug!(evicted = excess, remaining = self.total_posts(), "cache eviction");
    }
}

// ─── Loading from the VCS ───────────────────────────────────────────

/// Read posts for one repository from the commit graph.
///
/// `reference` is the branch to walk (`origin/<branch>` for isolated
/// clones, the local branch name for the workspace).
pub fn load_repository_posts(
    repo_path: &Path,
    reference: &str,
    repository: &str,
    is_workspace: bool,
    is_origin: bool,
    window: &LogWindow,
) -> Result<Vec<Post>> {
    let unpushed = if is_workspace {
        git::unpushed_hashes(repo_path, reference).unwrap_or_default()
    } else {
        HashSet::new()
    };

    let commits = git::log_commits(repo_path, reference, window)?;
    Ok(commits
        .iter()
        .map(|entry| Post::from_commit(entry, repository, is_workspace, is_origin, &unpushed))
        .collect())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
