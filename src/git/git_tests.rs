//! Unit tests for the git plumbing layer.
//!
//! Tests run against scratch repositories created in temp dirs.
//! Requires `git` to be in PATH.

use super::*;
use tempfile::TempDir;

/// Fresh repository with a configured identity.
fn scratch_repo() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    init(dir.path(), "main").expect("git init");
    config_set(dir.path(), "user.name", "Test Author").unwrap();
    config_set(dir.path(), "user.email", "test@example.com").unwrap();
    dir
}

// ─── Exec layer ─────────────────────────────────────────────────────

#[test]
fn test_run_captures_failure_without_erroring() {
    let repo = scratch_repo();
    let out = run(repo.path(), &["rev-parse", "definitely-not-a-rev"]).unwrap();
    assert!(!out.success());
    assert!(!out.stderr.is_empty());
}

#[test]
fn test_run_checked_maps_failure_to_git_error() {
    let repo = scratch_repo();
    let err = run_checked(repo.path(), &["cat-file", "-t", "0000000000"]).unwrap_err();
    assert_eq!(err.code(), "GIT_ERROR");
}

// ─── Commits and refs ───────────────────────────────────────────────

#[test]
fn test_commit_tree_on_empty_tree() {
    let repo = scratch_repo();
    let hash = commit_tree(repo.path(), EMPTY_TREE, None, "first payload").unwrap();
    assert_eq!(hash.len(), 40);

    update_ref(repo.path(), "refs/gitmsg/social/lists/reading", &hash).unwrap();
    let resolved = rev_parse(repo.path(), "refs/gitmsg/social/lists/reading").unwrap();
    assert_eq!(resolved.as_deref(), Some(hash.as_str()));
}

#[test]
fn test_commit_tree_chains_parents() {
    let repo = scratch_repo();
    let first = commit_tree(repo.path(), EMPTY_TREE, None, "one").unwrap();
    let second = commit_tree(repo.path(), EMPTY_TREE, Some(&first), "two").unwrap();

    let parent = run_checked(repo.path(), &["rev-parse", &format!("{}^", second)]).unwrap();
    assert_eq!(parent, first);
}

#[test]
fn test_rev_parse_missing_is_none() {
    let repo = scratch_repo();
    assert!(rev_parse(repo.path(), "refs/heads/nope").unwrap().is_none());
}

#[test]
fn test_commit_on_branch_creates_and_extends() {
    let repo = scratch_repo();
    let first = commit_on_branch(repo.path(), "social", "hello world").unwrap();
    let second = commit_on_branch(repo.path(), "social", "second post").unwrap();
    assert_ne!(first, second);

    let entries = log_commits(repo.path(), "social", &LogWindow::default()).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "second post");
    assert_eq!(entries[1].message, "hello world");
    assert_eq!(entries[0].author_email, "test@example.com");
}

#[test]
fn test_delete_ref_idempotent() {
    let repo = scratch_repo();
    let hash = commit_tree(repo.path(), EMPTY_TREE, None, "x").unwrap();
    update_ref(repo.path(), "refs/gitmsg/social/lists/tmp", &hash).unwrap();

    delete_ref(repo.path(), "refs/gitmsg/social/lists/tmp").unwrap();
    // Second delete of the now-absent ref must also succeed.
    delete_ref(repo.path(), "refs/gitmsg/social/lists/tmp").unwrap();
    assert!(rev_parse(repo.path(), "refs/gitmsg/social/lists/tmp").unwrap().is_none());
}

#[test]
fn test_for_each_ref_filters_by_prefix() {
    let repo = scratch_repo();
    let hash = commit_tree(repo.path(), EMPTY_TREE, None, "x").unwrap();
    update_ref(repo.path(), "refs/gitmsg/social/lists/alpha", &hash).unwrap();
    update_ref(repo.path(), "refs/gitmsg/social/lists/beta", &hash).unwrap();
    update_ref(repo.path(), "refs/gitmsg/other/lists/gamma", &hash).unwrap();

    let refs = for_each_ref(repo.path(), "refs/gitmsg/social/lists/").unwrap();
    let names: Vec<&str> = refs.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["refs/gitmsg/social/lists/alpha", "refs/gitmsg/social/lists/beta"]);
    assert!(refs.iter().all(|(_, h)| h == &hash));
}

// ─── Log parsing ────────────────────────────────────────────────────

#[test]
fn test_log_commits_preserves_multiline_message() {
    let repo = scratch_repo();
    let message = "subject line\n\nbody first\nbody second";
    commit_on_branch(repo.path(), "social", message).unwrap();

    let entries = log_commits(repo.path(), "social", &LogWindow::default()).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, message);
}

#[test]
fn test_log_commits_max_count() {
    let repo = scratch_repo();
    for i in 0..5 {
        commit_on_branch(repo.path(), "social", &format!("post {}", i)).unwrap();
    }
    let window = LogWindow { max_count: Some(2), ..Default::default() };
    let entries = log_commits(repo.path(), "social", &window).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "post 4");
}

#[test]
fn test_log_commits_missing_ref_is_read_error() {
    let repo = scratch_repo();
    let err = log_commits(repo.path(), "no-such-branch", &LogWindow::default()).unwrap_err();
    assert_eq!(err.code(), "READ_ERROR");
}

#[test]
fn test_parse_commit_record_malformed_is_none() {
    assert!(parse_commit_record("only-two␞fields").is_none());
    assert!(parse_commit_record("").is_none());
}

#[test]
fn test_short_hash_is_twelve_hex() {
    let repo = scratch_repo();
    commit_on_branch(repo.path(), "social", "short hash check").unwrap();
    let entries = log_commits(repo.path(), "social", &LogWindow::default()).unwrap();
    assert_eq!(entries[0].short_hash().len(), 12);
    assert!(entries[0].hash.starts_with(entries[0].short_hash()));
}

// ─── Config ─────────────────────────────────────────────────────────

#[test]
fn test_config_roundtrip() {
    let repo = scratch_repo();
    assert!(config_get(repo.path(), "gitsocial.lastfetch").unwrap().is_none());

    config_set(repo.path(), "gitsocial.lastfetch", "2024-03-01T10:00:00Z").unwrap();
    assert_eq!(
        config_get(repo.path(), "gitsocial.lastfetch").unwrap().as_deref(),
        Some("2024-03-01T10:00:00Z")
    );

    config_unset(repo.path(), "gitsocial.lastfetch").unwrap();
    assert!(config_get(repo.path(), "gitsocial.lastfetch").unwrap().is_none());
}

#[test]
fn test_config_unset_missing_key_is_ok() {
    let repo = scratch_repo();
    config_unset(repo.path(), "gitsocial.neverset").unwrap();
}

// ─── Branches & identity ────────────────────────────────────────────

#[test]
fn test_detect_default_branch_finds_main() {
    let repo = scratch_repo();
    commit_on_branch(repo.path(), "main", "seed").unwrap();
    assert_eq!(detect_default_branch(repo.path()), "main");
}

#[test]
fn test_user_identity_reads_config() {
    let repo = scratch_repo();
    let (name, email) = user_identity(repo.path()).unwrap();
    assert_eq!(name, "Test Author");
    assert_eq!(email, "test@example.com");
}

#[test]
fn test_unpushed_count_without_remote_counts_all() {
    let repo = scratch_repo();
    commit_on_branch(repo.path(), "social", "one").unwrap();
    commit_on_branch(repo.path(), "social", "two").unwrap();
    assert_eq!(unpushed_count(repo.path(), "social").unwrap(), 2);
}

#[test]
fn test_unpushed_hashes_match_log() {
    let repo = scratch_repo();
    commit_on_branch(repo.path(), "social", "one").unwrap();
    let entries = log_commits(repo.path(), "social", &LogWindow::default()).unwrap();
    let hashes = unpushed_hashes(repo.path(), "social").unwrap();
    assert!(hashes.contains(entries[0].short_hash()));
}

// ─── Clone / fetch ──────────────────────────────────────────────────

#[test]
fn test_clone_and_fetch_from_local_origin() {
    let origin = scratch_repo();
    commit_on_branch(origin.path(), "social", "origin post").unwrap();

    let storage = TempDir::new().unwrap();
    let dest = storage.path().join("clone");
    clone(&origin.path().to_string_lossy(), &dest).unwrap();

    // A later commit in origin arrives through fetch_since.
    commit_on_branch(origin.path(), "social", "newer post").unwrap();
    fetch_since(&dest, "origin", "social", None).unwrap();

    let entries = log_commits(&dest, "origin/social", &LogWindow::default()).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "newer post");
}
