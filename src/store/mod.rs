//! List store — keyed, history-preserving JSON payloads on git refs.
//!
//! Each list lives at `refs/gitmsg/<ext>/lists/<name>`. A write creates a
//! commit on the empty tree whose message is the payload; the ref's commit
//! chain is the history. Trees never grow, and the store works on any
//! repository regardless of the checked-out branch.

pub mod repos;

use std::path::Path;

use serde_json::Value;

use crate::error::{Result, SocialError};
use crate::git::{self, LogWindow};

/// Backing ref name for a list.
pub fn list_ref(ext: &str, name: &str) -> String {
    format!("{}/{}/lists/{}", git::GITMSG_REF_ROOT, ext, name)
}

fn lists_prefix(ext: &str) -> String {
    format!("{}/{}/lists/", git::GITMSG_REF_ROOT, ext)
}

/// One entry of a list's history, newest first. `content` is the parsed
/// JSON payload when the commit message is valid JSON, the raw text
/// otherwise — readers must not crash on either.
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    pub hash: String,
    pub author: String,
    pub email: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub content: Value,
}

/// Read the JSON payload at any ref's tip commit. Absent refs and
/// non-JSON tips both yield `None`.
pub fn read_ref(workdir: &Path, reference: &str) -> Result<Option<Value>> {
    if git::rev_parse(workdir, reference)?.is_none() {
        return Ok(None);
    }

    let message = git::run_checked(workdir, &["log", "-1", "--format=%B", reference])
        .map_err(|e| SocialError::Read {
            what: format!("ref '{}'", reference),
            message: e.to_string(),
        })?;

    Ok(serde_json::from_str(&message).ok())
}

/// Read a list's current payload. Absent lists and non-JSON tips both
/// yield `None` (history still serves the raw text).
pub fn read(workdir: &Path, ext: &str, name: &str) -> Result<Option<Value>> {
    read_ref(workdir, &list_ref(ext, name))
}

/// Write a payload as a new empty-tree commit and advance the ref.
///
/// Concurrent writers race at the ref update; the loser observes
/// `REF_ERROR` and the ref is left pointing at the winner.
pub fn write(workdir: &Path, ext: &str, name: &str, data: &Value) -> Result<()> {
    let payload = serde_json::to_string_pretty(data)?;
    let reference = list_ref(ext, name);
    let parent = git::rev_parse(workdir, &reference)?;

    let hash = git::commit_tree(workdir, git::EMPTY_TREE, parent.as_deref(), &payload)?;
    git::update_ref(workdir, &reference, &hash)?;

    tracing::debug!(ext, name, commit = %&hash[..12.min(hash.len())], "list written");
    Ok(())
}

/// Delete a list. Deleting an absent list succeeds.
pub fn delete(workdir: &Path, ext: &str, name: &str) -> Result<()> {
    git::delete_ref(workdir, &list_ref(ext, name))
}

/// Names of every list under an extension.
pub fn enumerate(workdir: &Path, ext: &str) -> Result<Vec<String>> {
    let prefix = lists_prefix(ext);
    let refs = git::for_each_ref(workdir, &prefix)?;
    Ok(refs
        .into_iter()
        .filter_map(|(name, _)| name.strip_prefix(&prefix).map(str::to_string))
        .collect())
}

/// Walk a list's commit chain newest-first, with optional date filtering.
pub fn history(
    workdir: &Path,
    ext: &str,
    name: &str,
    window: &LogWindow,
) -> Result<Vec<HistoryEntry>> {
    let reference = list_ref(ext, name);
    if git::rev_parse(workdir, &reference)?.is_none() {
        return Err(SocialError::ListNotFound(name.to_string()));
    }

    let commits = git::log_commits(workdir, &reference, window)?;
    Ok(commits
        .into_iter()
        .map(|c| {
            let content = serde_json::from_str(&c.message)
                .unwrap_or_else(|_| Value::String(c.message.clone()));
            HistoryEntry {
                hash: c.hash,
                author: c.author_name,
                email: c.author_email,
                timestamp: c.timestamp,
                content,
            }
        })
        .collect())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
