//! Social lists — curated repository collections stored as list payloads.
//!
//! A list's payload lives under `refs/gitmsg/social/lists/<id>` in the
//! workspace. Followed lists carry a `source` URL and can be re-synced
//! from the owner's repository; their member repositories are what the
//! timeline aggregates over.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gitsocial::{branched_identity, normalize_url, split_identity};

use crate::error::{Result, SocialError};
use crate::git;
use crate::protocol::SOCIAL_EXT;
use crate::store;
use crate::store::repos::RepoStore;

/// List names reserved for other social payloads.
const RESERVED_NAMES: &[&str] = &["followers"];

/// A curated list of repositories.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialList {
    pub id: String,
    pub name: String,
    /// Member repositories as branched identities (`<url>#branch:<b>`)
    /// or plain normalized URLs.
    #[serde(default)]
    pub repositories: Vec<String>,
    /// Owning repository URL for followed lists; `None` for local lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Stable id for a list name: lowercase, runs of non-alphanumerics
/// collapse to a single dash. Panel identity depends on this being
/// deterministic.
pub fn stable_list_id(name: &str) -> String {
    let mut id = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !id.is_empty() {
                id.push('-');
            }
            pending_dash = false;
            id.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    id
}

fn decode(name: &str, value: serde_json::Value) -> Option<SocialList> {
    match serde_json::from_value::<SocialList>(value) {
        Ok(list) => Some(list),
        Err(e) => {
            // Foreign or hand-edited payloads must not take the view down.
            tracing::warn!(list = name, error = %e, "undecodable list payload, skipping");
            None
        }
    }
}

/// All lists in the workspace, reserved payloads excluded.
pub fn get_all(workdir: &Path) -> Result<Vec<SocialList>> {
    let mut result = Vec::new();
    for name in store::enumerate(workdir, SOCIAL_EXT)? {
        if RESERVED_NAMES.contains(&name.as_str()) {
            continue;
        }
        if let Some(value) = store::read(workdir, SOCIAL_EXT, &name)? {
            result.extend(decode(&name, value));
        }
    }
    result.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(result)
}

pub fn get(workdir: &Path, id: &str) -> Result<Option<SocialList>> {
    if RESERVED_NAMES.contains(&id) {
        return Ok(None);
    }
    match store::read(workdir, SOCIAL_EXT, id)? {
        Some(value) => Ok(decode(id, value)),
        None => Ok(None),
    }
}

fn save(workdir: &Path, list: &SocialList) -> Result<()> {
    let value = serde_json::to_value(list)?;
    store::write(workdir, SOCIAL_EXT, &list.id, &value)
}

/// Create a new local list. The id derives from the name and must be free.
pub fn create(workdir: &Path, name: &str) -> Result<SocialList> {
    let id = stable_list_id(name);
    if id.is_empty() {
        return Err(SocialError::Validation(format!("unusable list name '{}'", name)));
    }
    if RESERVED_NAMES.contains(&id.as_str()) || get(workdir, &id)?.is_some() {
        return Err(SocialError::Validation(format!("list '{}' already exists", id)));
    }

    let list = SocialList {
        id,
        name: name.to_string(),
        repositories: Vec::new(),
        source: None,
        created_at: Some(Utc::now()),
    };
    save(workdir, &list)?;
    Ok(list)
}

/// Rename a list. The id stays stable so panels and follows keep working.
pub fn rename(workdir: &Path, id: &str, new_name: &str) -> Result<SocialList> {
    let mut list = get(workdir, id)?.ok_or_else(|| SocialError::ListNotFound(id.to_string()))?;
    list.name = new_name.to_string();
    save(workdir, &list)?;
    Ok(list)
}

pub fn delete(workdir: &Path, id: &str) -> Result<()> {
    store::delete(workdir, SOCIAL_EXT, id)
}

/// Add a repository (optionally branch-qualified) to a list.
pub fn add_repository(workdir: &Path, id: &str, url: &str, branch: Option<&str>) -> Result<SocialList> {
    let mut list = get(workdir, id)?.ok_or_else(|| SocialError::ListNotFound(id.to_string()))?;

    let identity = match branch {
        Some(branch) => branched_identity(url, branch),
        None => normalize_url(url),
    };
    if !list.repositories.contains(&identity) {
        list.repositories.push(identity);
        save(workdir, &list)?;
    }
    Ok(list)
}

pub fn remove_repository(workdir: &Path, id: &str, url: &str) -> Result<SocialList> {
    let mut list = get(workdir, id)?.ok_or_else(|| SocialError::ListNotFound(id.to_string()))?;

    let normalized = normalize_url(url);
    list.repositories.retain(|identity| {
        let (member_url, _) = split_identity(identity);
        normalize_url(&member_url) != normalized
    });
    save(workdir, &list)?;
    Ok(list)
}

/// Union of member repositories across every list — the `following` set.
pub fn following_repositories(workdir: &Path) -> Result<Vec<String>> {
    let mut repos: Vec<String> = Vec::new();
    for list in get_all(workdir)? {
        repos.extend(list.repositories);
    }
    repos.sort();
    repos.dedup();
    Ok(repos)
}

// ─── Followed remote lists ──────────────────────────────────────────

/// Ref under which a remote's gitmsg refs land after [`git::fetch_gitmsg_refs`].
fn remote_list_ref(remote: &str, id: &str) -> String {
    format!("{}/remotes/{}/{}/lists/{}", git::GITMSG_REF_ROOT, remote, SOCIAL_EXT, id)
}

/// Read a remote list's payload out of its isolated clone.
fn read_remote_list(store: &RepoStore, url: &str, id: &str) -> Result<SocialList> {
    let repo_path = store.ensure_initialized(url)?;
    git::fetch_gitmsg_refs(&repo_path, "origin")?;

    let reference = remote_list_ref("origin", id);
    let value = store::read_ref(&repo_path, &reference)?
        .ok_or_else(|| SocialError::ListNotFound(format!("{} at {}", id, url)))?;

    decode(id, value).ok_or_else(|| {
        SocialError::Validation(format!("list '{}' at '{}' has no readable payload", id, url))
    })
}

/// Follow a list published by another repository: copy its payload into
/// the workspace with a `source` pointer and keep the clone persistent.
pub fn follow(workdir: &Path, store: &RepoStore, url: &str, id: &str) -> Result<SocialList> {
    if get(workdir, id)?.is_some() {
        return Err(SocialError::Validation(format!("list '{}' already exists", id)));
    }

    let mut list = read_remote_list(store, url, id)?;
    list.source = Some(normalize_url(url));
    store.set_persistent(url, true)?;
    save(workdir, &list)?;
    Ok(list)
}

/// Re-sync a followed list from its source repository.
pub fn sync(workdir: &Path, store: &RepoStore, id: &str) -> Result<SocialList> {
    let local = get(workdir, id)?.ok_or_else(|| SocialError::ListNotFound(id.to_string()))?;
    let source = local
        .source
        .ok_or_else(|| SocialError::Validation(format!("list '{}' is not followed", id)))?;

    let mut fresh = read_remote_list(store, &source, id)?;
    fresh.source = Some(source);
    save(workdir, &fresh)?;
    Ok(fresh)
}

/// Unfollow: drop the local copy. The isolated clone stays for GC to
/// collect once nothing else references it.
pub fn unfollow(workdir: &Path, store: &RepoStore, id: &str) -> Result<()> {
    if let Some(list) = get(workdir, id)? {
        if let Some(source) = &list.source {
            if let Err(e) = store.set_persistent(source, false) {
                tracing::debug!(url = %source, error = %e, "could not mark clone collectable");
            }
        }
    }
    delete(workdir, id)
}
