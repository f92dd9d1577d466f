//! Git plumbing — calls the `git` CLI for every persistence operation.
//!
//! The exec layer ([`run`]) never interprets output; typed operations on
//! top of it (refs, commits, config, fetch/push) map failures into the
//! stable error codes. All list and post storage goes through here.

use std::collections::HashSet;
use std::path::Path;
use std::process::Command;

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::error::{Result, SocialError};

// ─── Constants ──────────────────────────────────────────────────────

/// The well-known empty tree object. List commits hang off this tree so
/// list payloads live entirely in commit messages and trees never grow.
pub const EMPTY_TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";

/// Ref prefix for list storage: `refs/gitmsg/<ext>/lists/<name>`.
pub const GITMSG_REF_ROOT: &str = "refs/gitmsg";

/// Field separator in git log format — U+241E (SYMBOL FOR RECORD SEPARATOR).
/// Never appears in commit data.
const FIELD_SEP: &str = "␞";
/// Separator between records in git log output.
const RECORD_SEP: &str = "␟";

// ─── Exec layer ─────────────────────────────────────────────────────

/// Raw result of a git invocation. Callers interpret; this layer does not.
#[derive(Clone, Debug)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Run git with the given arguments in `workdir`. Spawn failure maps to
/// `GIT_ERROR`; a non-zero exit is NOT an error at this layer.
pub fn run(workdir: &Path, args: &[&str]) -> Result<GitOutput> {
    let output = Command::new("git")
        .current_dir(workdir)
        .args(args)
        .output()
        .map_err(|e| {
            SocialError::Git(format!(
                "failed to execute git {}: {}. Is git installed and in PATH?",
                args.first().unwrap_or(&""),
                e
            ))
        })?;

    Ok(GitOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(-1),
    })
}

/// Run git and require a zero exit, returning trimmed stdout.
pub fn run_checked(workdir: &Path, args: &[&str]) -> Result<String> {
    let out = run(workdir, args)?;
    if !out.success() {
        return Err(SocialError::Git(format!(
            "git {} failed: {}",
            args.first().unwrap_or(&""),
            out.stderr.trim()
        )));
    }
    Ok(out.stdout.trim_end().to_string())
}

// ─── Commits ────────────────────────────────────────────────────────

/// A commit as read from `git log`, message body included.
#[derive(Clone, Debug)]
pub struct CommitEntry {
    pub hash: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
    /// Full raw message (subject + body).
    pub message: String,
}

impl CommitEntry {
    /// Twelve-hex addressing prefix used in post ids and references.
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(12)]
    }
}

/// Window filter for [`log_commits`]. `until` is inclusive.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWindow {
    pub since: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub max_count: Option<usize>,
}

/// Read commits reachable from `reference`, newest first.
///
/// Dates are forced to UTC (`T00:00:00Z`); git's `--until` is exclusive,
/// so the inclusive bound shifts one day forward.
pub fn log_commits(workdir: &Path, reference: &str, window: &LogWindow) -> Result<Vec<CommitEntry>> {
    let format = format!("--format={RECORD_SEP}%H{FIELD_SEP}%aI{FIELD_SEP}%an{FIELD_SEP}%ae{FIELD_SEP}%B");

    let mut args: Vec<String> = vec!["log".into(), format];
    if let Some(since) = window.since {
        args.push(format!("--since={}T00:00:00Z", since));
    }
    if let Some(until) = window.until {
        let next = until.checked_add_days(Days::new(1)).unwrap_or(until);
        args.push(format!("--until={}T00:00:00Z", next));
    }
    if let Some(max) = window.max_count {
        args.push(format!("--max-count={}", max));
    }
    args.push(reference.to_string());

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let out = run(workdir, &arg_refs)?;
    if !out.success() {
        return Err(SocialError::Read {
            what: format!("commits of '{}'", reference),
            message: out.stderr.trim().to_string(),
        });
    }

    Ok(out
        .stdout
        .split(RECORD_SEP)
        .filter(|s| !s.trim().is_empty())
        .filter_map(parse_commit_record)
        .collect())
}

/// Parse one `␞`-separated log record. Malformed records yield None —
/// foreign history must never take the pipeline down.
fn parse_commit_record(record: &str) -> Option<CommitEntry> {
    let fields: Vec<&str> = record.splitn(5, FIELD_SEP).collect();
    if fields.len() < 5 {
        return None;
    }

    let timestamp = DateTime::parse_from_rfc3339(fields[1].trim())
        .ok()?
        .with_timezone(&Utc);

    Some(CommitEntry {
        hash: fields[0].trim().to_string(),
        author_name: fields[2].trim().to_string(),
        author_email: fields[3].trim().to_string(),
        timestamp,
        message: fields[4].trim_end_matches('\n').to_string(),
    })
}

/// Create a commit object with `git commit-tree`. Returns the new hash.
pub fn commit_tree(
    workdir: &Path,
    tree: &str,
    parent: Option<&str>,
    message: &str,
) -> Result<String> {
    let mut args = vec!["commit-tree", tree];
    if let Some(parent) = parent {
        args.push("-p");
        args.push(parent);
    }
    args.push("-m");
    args.push(message);

    let out = run(workdir, &args)?;
    if !out.success() {
        return Err(SocialError::Commit(out.stderr.trim().to_string()));
    }
    Ok(out.stdout.trim().to_string())
}

/// Commit a message onto a branch without touching the working tree:
/// the new commit reuses the parent's tree (or the empty tree for a
/// branch that does not exist yet).
pub fn commit_on_branch(workdir: &Path, branch: &str, message: &str) -> Result<String> {
    let reference = format!("refs/heads/{}", branch);
    let parent = rev_parse(workdir, &reference)?;

    let tree = match &parent {
        Some(parent_hash) => run_checked(workdir, &["rev-parse", &format!("{}^{{tree}}", parent_hash)])?,
        None => EMPTY_TREE.to_string(),
    };

    let hash = commit_tree(workdir, &tree, parent.as_deref(), message)?;
    update_ref(workdir, &reference, &hash)?;
    Ok(hash)
}

// ─── Refs ───────────────────────────────────────────────────────────

/// Resolve a revision to a full hash; missing revisions are None, not errors.
pub fn rev_parse(workdir: &Path, rev: &str) -> Result<Option<String>> {
    let out = run(workdir, &["rev-parse", "--verify", "--quiet", rev])?;
    if out.success() {
        Ok(Some(out.stdout.trim().to_string()))
    } else {
        Ok(None)
    }
}

pub fn update_ref(workdir: &Path, reference: &str, hash: &str) -> Result<()> {
    let out = run(workdir, &["update-ref", reference, hash])?;
    if !out.success() {
        return Err(SocialError::Ref {
            reference: reference.to_string(),
            message: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// Delete a ref. Deleting an absent ref succeeds.
pub fn delete_ref(workdir: &Path, reference: &str) -> Result<()> {
    if rev_parse(workdir, reference)?.is_none() {
        return Ok(());
    }
    let out = run(workdir, &["update-ref", "-d", reference])?;
    if !out.success() {
        return Err(SocialError::Delete {
            reference: reference.to_string(),
            message: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// List `(refname, hash)` pairs under a prefix.
pub fn for_each_ref(workdir: &Path, prefix: &str) -> Result<Vec<(String, String)>> {
    let format = "--format=%(refname) %(objectname)";
    let out = run(workdir, &["for-each-ref", format, prefix])?;
    if !out.success() {
        return Err(SocialError::Enumerate {
            prefix: prefix.to_string(),
            message: out.stderr.trim().to_string(),
        });
    }

    Ok(out
        .stdout
        .lines()
        .filter_map(|line| {
            let (name, hash) = line.split_once(' ')?;
            Some((name.to_string(), hash.to_string()))
        })
        .collect())
}

// ─── Config ─────────────────────────────────────────────────────────

/// Read a config value; unset keys are None (`git config` exits 1).
pub fn config_get(workdir: &Path, key: &str) -> Result<Option<String>> {
    let out = run(workdir, &["config", "--get", key])?;
    if out.success() {
        Ok(Some(out.stdout.trim().to_string()))
    } else if out.status == 1 {
        Ok(None)
    } else {
        Err(SocialError::Read {
            what: format!("config key '{}'", key),
            message: out.stderr.trim().to_string(),
        })
    }
}

pub fn config_set(workdir: &Path, key: &str, value: &str) -> Result<()> {
    let out = run(workdir, &["config", key, value])?;
    if !out.success() {
        return Err(SocialError::Write {
            what: format!("config key '{}'", key),
            message: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

pub fn config_unset(workdir: &Path, key: &str) -> Result<()> {
    let out = run(workdir, &["config", "--unset", key])?;
    // Exit 5 means the key was not set — unsetting it is a no-op success.
    if !out.success() && out.status != 5 {
        return Err(SocialError::Write {
            what: format!("config key '{}'", key),
            message: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

// ─── Branches & identity ────────────────────────────────────────────

/// Name of the currently checked-out branch.
pub fn current_branch(workdir: &Path) -> Result<String> {
    run_checked(workdir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Detect the default branch by trying the usual names, falling back to HEAD.
pub fn detect_default_branch(workdir: &Path) -> String {
    for branch in &["main", "master", "develop", "trunk"] {
        if matches!(rev_parse(workdir, branch), Ok(Some(_))) {
            return branch.to_string();
        }
    }
    "HEAD".to_string()
}

/// Configured author identity `(name, email)` of the workspace.
pub fn user_identity(workdir: &Path) -> Result<(String, String)> {
    let name = config_get(workdir, "user.name")?.unwrap_or_else(|| "unknown".to_string());
    let email = config_get(workdir, "user.email")?.unwrap_or_else(|| "unknown@localhost".to_string());
    Ok((name, email))
}

// ─── Clone / fetch / push ───────────────────────────────────────────

/// Clone `url` into `dest`. The clone keeps its working tree; list refs
/// and social branches are fetched as ordinary refs.
pub fn clone(url: &str, dest: &Path) -> Result<()> {
    let parent = dest.parent().unwrap_or(dest);
    std::fs::create_dir_all(parent)?;

    let dest_str = dest.to_string_lossy();
    let out = run(parent, &["clone", url, &dest_str])?;
    if !out.success() {
        return Err(SocialError::Init(format!(
            "clone of '{}' failed: {}",
            url,
            out.stderr.trim()
        )));
    }
    Ok(())
}

/// Fetch a branch, shallow-limited to commits after `since` when given.
/// Transports that reject shallow fetches get a full retry.
pub fn fetch_since(
    workdir: &Path,
    remote: &str,
    branch: &str,
    since: Option<NaiveDate>,
) -> Result<()> {
    if let Some(since) = since {
        let shallow = format!("--shallow-since={}", since);
        let out = run(workdir, &["fetch", remote, branch, &shallow])?;
        if out.success() {
            return Ok(());
        }
        tracing::debug!(
            remote,
            branch,
            stderr = %out.stderr.trim(),
            "shallow fetch rejected, retrying full"
        );
    }

    let out = run(workdir, &["fetch", remote, branch])?;
    if !out.success() {
        return Err(SocialError::Fetch {
            url: remote.to_string(),
            message: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

/// Fetch every `refs/gitmsg/**` ref from a remote into the local
/// `remotes/<remote>` mirror (lists travel with posts). Forced: the
/// mirror always tracks the remote.
pub fn fetch_gitmsg_refs(workdir: &Path, remote: &str) -> Result<()> {
    let refspec = format!("+{root}/*:{root}/remotes/{remote}/*", root = GITMSG_REF_ROOT);
    let out = run(workdir, &["fetch", remote, &refspec])?;
    if !out.success() {
        return Err(SocialError::Fetch {
            url: remote.to_string(),
            message: out.stderr.trim().to_string(),
        });
    }
    Ok(())
}

pub fn push(workdir: &Path, remote: &str, refspec: &str) -> Result<()> {
    let out = run(workdir, &["push", remote, refspec])?;
    if !out.success() {
        return Err(SocialError::Git(format!(
            "push to '{}' failed: {}",
            remote,
            out.stderr.trim()
        )));
    }
    Ok(())
}

/// Number of commits on `branch` not yet on `origin/<branch>`.
/// With no remote-tracking ref, every commit counts as unpushed.
pub fn unpushed_count(workdir: &Path, branch: &str) -> Result<usize> {
    let range = if rev_parse(workdir, &format!("origin/{}", branch))?.is_some() {
        format!("origin/{}..{}", branch, branch)
    } else {
        branch.to_string()
    };

    let out = run_checked(workdir, &["rev-list", "--count", &range])?;
    out.parse::<usize>().map_err(|e| SocialError::Read {
        what: format!("unpushed count of '{}'", branch),
        message: e.to_string(),
    })
}

/// Short (12-hex) hashes of unpushed commits, for `isUnpushed` display hints.
pub fn unpushed_hashes(workdir: &Path, branch: &str) -> Result<HashSet<String>> {
    let range = if rev_parse(workdir, &format!("origin/{}", branch))?.is_some() {
        format!("origin/{}..{}", branch, branch)
    } else {
        branch.to_string()
    };

    let out = run(workdir, &["rev-list", &range])?;
    if !out.success() {
        return Ok(HashSet::new());
    }
    Ok(out
        .stdout
        .lines()
        .map(|l| l.trim()[..l.trim().len().min(12)].to_string())
        .collect())
}

/// Initialize a repository (used by setup paths and tests).
pub fn init(workdir: &Path, initial_branch: &str) -> Result<()> {
    std::fs::create_dir_all(workdir)?;
    let branch_arg = format!("--initial-branch={}", initial_branch);
    let out = run(workdir, &["init", &branch_arg])?;
    if !out.success() {
        return Err(SocialError::Init(out.stderr.trim().to_string()));
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
