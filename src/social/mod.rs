//! Social interactions — posts, comments, reposts, quotes, and the
//! bookkeeping around them (followers, unpushed work, avatars).
//!
//! Writing is commit creation on the configured social branch; the
//! working tree is never touched. Interaction counts are one-hop
//! aggregation over references and live in the post cache.

pub mod lists;

use std::path::Path;

use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{Post, PostCache};
use crate::error::{Result, SocialError};
use crate::git;
use crate::protocol::{self, Header, Message, PostType, Reference, SOCIAL_EXT};
use crate::store;

/// Branch that carries the social timeline. Configurable via
/// `gitsocial.branch`; defaults to the checked-out branch.
pub fn social_branch(workdir: &Path) -> String {
    match git::config_get(workdir, "gitsocial.branch") {
        Ok(Some(branch)) => branch,
        _ => git::current_branch(workdir).unwrap_or_else(|_| "main".to_string()),
    }
}

// ─── Creation ───────────────────────────────────────────────────────

/// Create a plain post. Returns the new commit hash.
pub fn create_post(workdir: &Path, content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(SocialError::Validation("post content is empty".to_string()));
    }

    let message = Message {
        content: content.to_string(),
        header: Header::new(SOCIAL_EXT).with_field("type", "post"),
        references: Vec::new(),
    };
    commit_message(workdir, &message)
}

/// Create a comment, repost, or quote targeting an existing post.
///
/// The reference carries the target's author, email, and creation time;
/// a repost's body is the single attribution line `#commit:<hash>`.
pub fn create_interaction(
    workdir: &Path,
    kind: PostType,
    target: &Post,
    content: &str,
) -> Result<String> {
    if kind == PostType::Post {
        return Err(SocialError::Validation(
            "interactions are comments, reposts, or quotes".to_string(),
        ));
    }

    let content = match kind {
        PostType::Repost => target.id.clone(),
        _ => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(SocialError::Validation(format!("{} content is empty", kind)));
            }
            trimmed.to_string()
        }
    };

    let reference = Reference {
        ext: SOCIAL_EXT.to_string(),
        author: target.author.name.clone(),
        email: target.author.email.clone(),
        time: target.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        target: target.id.clone(),
        version: protocol::PROTOCOL_VERSION.to_string(),
        ext_version: protocol::SOCIAL_EXT_VERSION.to_string(),
        fields: Vec::new(),
        metadata: None,
    };

    let message = Message {
        content,
        header: Header::new(SOCIAL_EXT).with_field("type", kind.as_str()),
        references: vec![reference],
    };
    commit_message(workdir, &message)
}

fn commit_message(workdir: &Path, message: &Message) -> Result<String> {
    if !protocol::validate(message) {
        return Err(SocialError::Validation("message failed protocol validation".to_string()));
    }

    let branch = social_branch(workdir);
    let text = protocol::format_message(message);
    let hash = git::commit_on_branch(workdir, &branch, &text)?;
    tracing::info!(
        branch = %branch,
        kind = %protocol::post_type(Some(message)),
        commit = %&hash[..12.min(hash.len())],
        "social commit created"
    );
    Ok(hash)
}

// ─── Followers ──────────────────────────────────────────────────────

/// Follower records are a list payload under the reserved `followers`
/// name; the shape is extension-defined, so raw JSON passes through.
pub fn get_followers(workdir: &Path) -> Result<Value> {
    Ok(store::read(workdir, SOCIAL_EXT, "followers")?.unwrap_or(Value::Array(Vec::new())))
}

// ─── Notifications ──────────────────────────────────────────────────

/// An interaction from elsewhere that targets one of the workspace's posts.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Id of the interacting post.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: PostType,
    pub author: String,
    pub email: String,
    /// The workspace post being interacted with.
    pub target: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Derive notifications from the cache: posts in other repositories whose
/// reference points at a workspace post.
pub fn notifications(cache: &PostCache, workspace_key: &str) -> Vec<Notification> {
    let own_ids: std::collections::HashSet<&str> = cache
        .posts_for(workspace_key)
        .iter()
        .map(|p| p.id.as_str())
        .collect();

    let mut result: Vec<Notification> = Vec::new();
    for repo in cache.repositories() {
        if repo == workspace_key {
            continue;
        }
        for post in cache.posts_for(&repo) {
            let Some(target) = post.ref_targets.first() else {
                continue;
            };
            if post.post_type == PostType::Post || !own_ids.contains(target.as_str()) {
                continue;
            }
            result.push(Notification {
                id: post.id.clone(),
                kind: post.post_type,
                author: post.author.name.clone(),
                email: post.author.email.clone(),
                target: target.clone(),
                timestamp: post.timestamp,
            });
        }
    }

    result.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    result
}

// ─── Push & unpushed ────────────────────────────────────────────────

/// Counts of local work not yet on the remote.
#[derive(Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnpushedCounts {
    pub posts: usize,
    pub lists: usize,
}

pub fn unpushed_counts(workdir: &Path) -> Result<UnpushedCounts> {
    let branch = social_branch(workdir);
    let posts = git::unpushed_count(workdir, &branch)?;
    let lists = unpushed_lists_count(workdir)?;
    Ok(UnpushedCounts { posts, lists })
}

/// A list counts as unpushed when the remote-tracking gitmsg ref is
/// missing or points elsewhere.
pub fn unpushed_lists_count(workdir: &Path) -> Result<usize> {
    let prefix = format!("{}/{}/lists/", git::GITMSG_REF_ROOT, SOCIAL_EXT);
    let local = git::for_each_ref(workdir, &prefix)?;

    let mut count = 0;
    for (reference, hash) in local {
        let Some(name) = reference.strip_prefix(&prefix) else {
            continue;
        };
        let remote_ref = format!(
            "{}/remotes/origin/{}/lists/{}",
            git::GITMSG_REF_ROOT,
            SOCIAL_EXT,
            name
        );
        match git::rev_parse(workdir, &remote_ref)? {
            Some(remote_hash) if remote_hash == hash => {}
            _ => count += 1,
        }
    }
    Ok(count)
}

/// Push the social branch and every gitmsg ref to origin.
pub fn push_to_remote(workdir: &Path) -> Result<UnpushedCounts> {
    let branch = social_branch(workdir);
    let before = unpushed_counts(workdir)?;

    git::push(workdir, "origin", &format!("refs/heads/{branch}:refs/heads/{branch}"))?;
    // Social refs only; the remote-tracking mirror under `remotes/` stays local.
    git::push(
        workdir,
        "origin",
        &format!("{root}/{SOCIAL_EXT}/*:{root}/{SOCIAL_EXT}/*", root = git::GITMSG_REF_ROOT),
    )?;

    // Update the local remote-tracking gitmsg refs so unpushed counts
    // settle without waiting for the next fetch.
    git::fetch_gitmsg_refs(workdir, "origin")?;
    tracing::info!(branch = %branch, posts = before.posts, lists = before.lists, "pushed to origin");
    Ok(before)
}

// ─── Avatars ────────────────────────────────────────────────────────

/// Derive an avatar URL from an author email, without any network probe.
/// GitHub noreply addresses map to the user's GitHub avatar; anything
/// else has no derivable avatar.
pub fn avatar_url(email: &str) -> Option<String> {
    let local = email.strip_suffix("@users.noreply.github.com")?;
    // Modern form is `<id>+<login>`, legacy is plain `<login>`.
    let login = local.split_once('+').map(|(_, login)| login).unwrap_or(local);
    if login.is_empty() {
        return None;
    }
    Some(format!("https://github.com/{}.png", login))
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "social_tests.rs"]
mod tests;
