//! Unit tests for the fetch coordinator.
//!
//! Local scratch repositories stand in for remotes; requires `git` in PATH.

use super::*;
use crate::social::lists;

use chrono::Days;
use tempfile::TempDir;

fn scratch_repo() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    git::init(dir.path(), "main").expect("git init");
    git::config_set(dir.path(), "user.name", "Test Author").unwrap();
    git::config_set(dir.path(), "user.email", "test@example.com").unwrap();
    git::config_set(dir.path(), "gitsocial.branch", "social").unwrap();
    dir
}

fn coordinator(storage: &TempDir) -> FetchCoordinator {
    FetchCoordinator::new(
        Arc::new(RepoStore::new(storage.path())),
        Arc::new(RwLock::new(PostCache::default())),
    )
}

fn a_week_ago() -> NaiveDate {
    Utc::now().date_naive() - Days::new(7)
}

// ─── Scope parsing ──────────────────────────────────────────────────

#[test]
fn test_scope_parse() {
    assert_eq!(Scope::parse("timeline"), Some(Scope::Timeline));
    assert_eq!(Scope::parse("following"), Some(Scope::Timeline));
    assert_eq!(Scope::parse("repository:my"), Some(Scope::Workspace));
    assert_eq!(Scope::parse("workspace:my"), Some(Scope::Workspace));
    assert_eq!(Scope::parse("list:rust"), Some(Scope::List("rust".to_string())));
    assert_eq!(
        Scope::parse("repository:https://github.com/a/b"),
        Some(Scope::Repository("https://github.com/a/b".to_string()))
    );
    assert_eq!(Scope::parse("garbage"), None);
}

// ─── ensure_data_for_date_range ─────────────────────────────────────

#[test]
fn test_ensure_clones_fetches_and_covers() {
    let origin = scratch_repo();
    git::commit_on_branch(origin.path(), "social", "first post").unwrap();

    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);
    let url = origin.path().to_string_lossy().to_string();
    let since = a_week_ago();

    coordinator
        .ensure_data_for_date_range(&url, Some("social"), since, true)
        .unwrap();

    // Fetched ranges cover `since` (monotonicity invariant).
    let normalized = normalize_url(&url);
    let config = coordinator
        .store()
        .read_config(&coordinator.store().repo_path(&normalized))
        .unwrap();
    assert!(ranges_cover(&config.fetched_ranges, since));
    assert!(config.last_fetch.is_some());

    // The cache holds the posts.
    let cache = coordinator.cache().read().unwrap();
    assert_eq!(cache.posts_for(&normalized).len(), 1);
    assert!(cache.is_cache_range_covered(Utc::now()));
}

#[test]
fn test_ensure_covered_window_skips_fetch() {
    let origin = scratch_repo();
    git::commit_on_branch(origin.path(), "social", "first post").unwrap();

    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);
    let url = origin.path().to_string_lossy().to_string();
    let normalized = normalize_url(&url);
    let since = a_week_ago();

    coordinator
        .ensure_data_for_date_range(&url, Some("social"), since, true)
        .unwrap();

    // A new post appears upstream. A covered window must NOT fetch it.
    git::commit_on_branch(origin.path(), "social", "second post").unwrap();
    coordinator
        .ensure_data_for_date_range(&url, Some("social"), since, true)
        .unwrap();

    let cache = coordinator.cache().read().unwrap();
    assert_eq!(cache.posts_for(&normalized).len(), 1, "covered window fetched anyway");
}

#[test]
fn test_ensure_warms_cold_cache_without_fetch() {
    let origin = scratch_repo();
    git::commit_on_branch(origin.path(), "social", "first post").unwrap();

    let storage = TempDir::new().unwrap();
    let url = origin.path().to_string_lossy().to_string();
    let normalized = normalize_url(&url);
    let since = a_week_ago();

    // First session fetches.
    let first = coordinator(&storage);
    first
        .ensure_data_for_date_range(&url, Some("social"), since, true)
        .unwrap();
    drop(first);

    // Second session: ranges persisted, cache empty. Ensure reloads from
    // the local clone.
    let second = coordinator(&storage);
    second
        .ensure_data_for_date_range(&url, Some("social"), since, true)
        .unwrap();

    let cache = second.cache().read().unwrap();
    assert_eq!(cache.posts_for(&normalized).len(), 1);
}

#[test]
fn test_ensure_failure_leaves_ranges_unchanged() {
    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);

    let err = coordinator
        .ensure_data_for_date_range("/nonexistent/repo/path", Some("social"), a_week_ago(), true)
        .unwrap_err();
    assert_eq!(err.code(), "INIT_ERROR");
    assert!(coordinator.store().known_repositories().unwrap().is_empty());
}

#[test]
fn test_ensure_nonpersistent_marks_clone_collectable() {
    let origin = scratch_repo();
    git::commit_on_branch(origin.path(), "social", "post").unwrap();

    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);
    let url = origin.path().to_string_lossy().to_string();

    coordinator
        .ensure_data_for_date_range(&url, Some("social"), a_week_ago(), false)
        .unwrap();

    let normalized = normalize_url(&url);
    let config = coordinator
        .store()
        .read_config(&coordinator.store().repo_path(&normalized))
        .unwrap();
    assert!(!config.persistent);
}

// ─── refresh_repository ─────────────────────────────────────────────

#[test]
fn test_refresh_repository_pulls_new_commits() {
    let origin = scratch_repo();
    git::commit_on_branch(origin.path(), "social", "first post").unwrap();

    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);
    let url = origin.path().to_string_lossy().to_string();
    let normalized = normalize_url(&url);

    coordinator
        .ensure_data_for_date_range(&url, Some("social"), a_week_ago(), true)
        .unwrap();
    git::commit_on_branch(origin.path(), "social", "second post").unwrap();

    coordinator.refresh_repository(&url, Some("social")).unwrap();

    let cache = coordinator.cache().read().unwrap();
    assert_eq!(cache.posts_for(&normalized).len(), 2);
}

// ─── fetch_updates ──────────────────────────────────────────────────

#[test]
fn test_fetch_updates_reports_partial_progress() {
    let good = scratch_repo();
    git::commit_on_branch(good.path(), "social", "post").unwrap();

    let ws = scratch_repo();
    lists::create(ws.path(), "mixed").unwrap();
    lists::add_repository(ws.path(), "mixed", &good.path().to_string_lossy(), Some("social"))
        .unwrap();
    lists::add_repository(ws.path(), "mixed", "/nonexistent/repo/path", None).unwrap();

    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);

    let summary = coordinator
        .fetch_updates(ws.path(), &Scope::List("mixed".to_string()))
        .unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.outcomes.len(), 2);
    assert!(summary.outcomes.iter().any(|o| !o.ok && o.error.is_some()));
}

#[test]
fn test_fetch_updates_missing_list_errors() {
    let ws = scratch_repo();
    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);

    let err = coordinator
        .fetch_updates(ws.path(), &Scope::List("ghost".to_string()))
        .unwrap_err();
    assert_eq!(err.code(), "LIST_NOT_FOUND");
}

#[test]
fn test_scope_repositories_workspace_is_empty() {
    let ws = scratch_repo();
    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);
    assert!(coordinator
        .scope_repositories(ws.path(), &Scope::Workspace)
        .unwrap()
        .is_empty());
}

// ─── refresh_cache ──────────────────────────────────────────────────

#[test]
fn test_refresh_cache_all_rebuilds_known_clones() {
    let origin = scratch_repo();
    git::commit_on_branch(origin.path(), "social", "post").unwrap();

    let storage = TempDir::new().unwrap();
    let coordinator = coordinator(&storage);
    let url = origin.path().to_string_lossy().to_string();
    let normalized = normalize_url(&url);

    coordinator
        .ensure_data_for_date_range(&url, Some("social"), a_week_ago(), true)
        .unwrap();
    coordinator.cache().write().unwrap().clear(&crate::cache::ClearScope::All);

    coordinator.refresh_cache(origin.path(), true, &[], &[]).unwrap();
    let cache = coordinator.cache().read().unwrap();
    assert_eq!(cache.posts_for(&normalized).len(), 1);
}
