//! Unit tests for the broker handlers, driven through the registry the
//! way the server loop drives them.

use super::*;
use crate::broker::protocol::InboundMessage;
use crate::social;

use serde_json::{json, Value};
use tempfile::TempDir;

fn make_ctx() -> (TempDir, TempDir, HandlerContext) {
    let ws = TempDir::new().unwrap();
    git::init(ws.path(), "main").unwrap();
    git::config_set(ws.path(), "user.name", "Test Author").unwrap();
    git::config_set(ws.path(), "user.email", "test@example.com").unwrap();
    git::config_set(ws.path(), "gitsocial.branch", "social").unwrap();

    let storage = TempDir::new().unwrap();
    let ctx = HandlerContext::new(ws.path().to_path_buf(), storage.path().to_path_buf());
    (ws, storage, ctx)
}

fn inbound(value: Value) -> InboundMessage {
    serde_json::from_value(value).unwrap()
}

fn dispatch_one(ctx: &HandlerContext, registry: &HandlerRegistry, value: Value) -> Value {
    let out = registry.dispatch(ctx, &inbound(value));
    assert_eq!(out.len(), 1, "expected exactly one response");
    serde_json::to_value(&out[0]).unwrap()
}

// ─── Registry semantics ─────────────────────────────────────────────

#[test]
fn test_default_registry_covers_public_surface() {
    let registry = default_registry();
    for message_type in [
        "social.getPosts",
        "social.createPost",
        "social.createInteraction",
        "social.searchPosts",
        "list.getAll",
        "list.create",
        "list.rename",
        "list.delete",
        "list.follow",
        "list.sync",
        "list.unfollow",
        "list.history",
        "addRepository",
        "removeRepository",
        "fetchRepositories",
        "fetchUpdates",
        "fetchSpecificRepositories",
        "fetchListRepositories",
        "pushToRemote",
        "getUnpushedCounts",
        "getUnpushedListsCount",
        "getLogs",
        "getNotifications",
        "getFollowers",
        "getAvatar",
        "openExternal",
        "getSettings",
        "updateSettings",
        "refresh",
    ] {
        assert!(registry.contains(message_type), "missing handler for {message_type}");
    }
}

#[test]
fn test_reregistration_replaces() {
    fn stub(_: &HandlerContext, _: &InboundMessage) -> crate::error::Result<Vec<crate::broker::protocol::OutboundMessage>> {
        Ok(vec![crate::broker::protocol::OutboundMessage::event(
            "stubbed",
            json!({}),
        )])
    }

    let (_ws, _storage, ctx) = make_ctx();
    let mut registry = default_registry();
    let before = registry.registered_types().len();

    registry.register("getSettings", stub);
    assert_eq!(registry.registered_types().len(), before);

    let value = dispatch_one(&ctx, &registry, json!({"type": "getSettings"}));
    assert_eq!(value["type"], "stubbed");
}

#[test]
fn test_dispatch_correlates_request_id() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    let value = dispatch_one(&ctx, &registry, json!({"type": "getSettings", "id": "q-7"}));
    assert_eq!(value["requestId"], "q-7");
}

// ─── Posts ──────────────────────────────────────────────────────────

#[test]
fn test_create_post_then_get_posts() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    let created = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.createPost", "id": "c1", "content": "hello broker"}),
    );
    assert_eq!(created["type"], "postCreated");
    assert!(created["data"]["id"].as_str().unwrap().starts_with("#commit:"));

    let posts = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.getPosts", "scope": "repository:my", "prefetch": false}),
    );
    assert_eq!(posts["type"], "posts");
    let items = posts["data"]["posts"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["cleanContent"], "hello broker");
    assert_eq!(posts["data"]["stats"]["totalPosts"], 1);
}

#[test]
fn test_create_post_missing_content_is_validation_error() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    let value = dispatch_one(&ctx, &registry, json!({"type": "social.createPost", "id": "c2"}));
    assert_eq!(value["type"], "error");
    assert_eq!(value["data"]["code"], "VALIDATION_ERROR");
    assert_eq!(value["requestId"], "c2");
}

#[test]
fn test_create_interaction_flow() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.createPost", "content": "target post"}),
    );
    let posts = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.getPosts", "scope": "repository:my", "prefetch": false}),
    );
    let target_id = posts["data"]["posts"][0]["id"].as_str().unwrap().to_string();

    let reply = dispatch_one(
        &ctx,
        &registry,
        json!({
            "type": "social.createInteraction",
            "kind": "comment",
            "target": target_id,
            "content": "well said",
        }),
    );
    assert_eq!(reply["type"], "interactionCreated");
    assert_eq!(reply["data"]["target"], target_id);

    // The target's count reflects the comment on the next query.
    let posts = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.getPosts", "scope": "repository:my", "prefetch": false}),
    );
    let target = posts["data"]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"] == target_id.as_str())
        .unwrap();
    assert_eq!(target["interactions"]["comments"], 1);
}

#[test]
fn test_create_interaction_unknown_target() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    let value = dispatch_one(
        &ctx,
        &registry,
        json!({
            "type": "social.createInteraction",
            "kind": "comment",
            "target": "#commit:aaaaaaaaaaaa",
            "content": "into the void",
        }),
    );
    assert_eq!(value["type"], "error");
    assert_eq!(value["data"]["code"], "VALIDATION_ERROR");
}

#[test]
fn test_search_posts() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.createPost", "content": "rust all the way"}),
    );
    dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.getPosts", "scope": "repository:my", "prefetch": false}),
    );

    let results = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.searchPosts", "query": "rust"}),
    );
    assert_eq!(results["type"], "searchResults");
    assert_eq!(results["data"]["posts"].as_array().unwrap().len(), 1);
}

// ─── Lists ──────────────────────────────────────────────────────────

#[test]
fn test_list_lifecycle_through_broker() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    let created = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "list.create", "name": "Reading List"}),
    );
    assert_eq!(created["type"], "listCreated");
    assert_eq!(created["data"]["list"]["id"], "reading-list");

    let added = dispatch_one(
        &ctx,
        &registry,
        json!({
            "type": "addRepository",
            "list": "reading-list",
            "url": "https://github.com/a/b",
            "branch": "social",
        }),
    );
    assert_eq!(
        added["data"]["list"]["repositories"][0],
        "https://github.com/a/b#branch:social"
    );

    let all = dispatch_one(&ctx, &registry, json!({"type": "list.getAll"}));
    assert_eq!(all["data"]["lists"].as_array().unwrap().len(), 1);

    let removed = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "removeRepository", "list": "reading-list", "url": "https://github.com/a/b"}),
    );
    assert!(removed["data"]["list"]["repositories"].as_array().unwrap().is_empty());

    let deleted = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "list.delete", "id": "reading-list"}),
    );
    assert_eq!(deleted["type"], "listDeleted");
}

#[test]
fn test_list_history_newest_first() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    dispatch_one(&ctx, &registry, json!({"type": "list.create", "name": "reading"}));
    dispatch_one(
        &ctx,
        &registry,
        json!({"type": "addRepository", "list": "reading", "url": "https://github.com/a/b"}),
    );

    let history = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "list.history", "id": "reading"}),
    );
    assert_eq!(history["type"], "listHistory");
    let entries = history["data"]["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    // Newest first: the tip has the repository, the first write does not.
    assert_eq!(
        entries[0]["content"]["repositories"][0],
        "https://github.com/a/b"
    );
    assert!(entries[1]["content"]["repositories"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[test]
fn test_list_rename_missing_reports_not_found() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    let value = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "list.rename", "id": "ghost", "name": "x"}),
    );
    assert_eq!(value["data"]["code"], "LIST_NOT_FOUND");
}

// ─── Fetch & push ───────────────────────────────────────────────────

#[test]
fn test_fetch_repositories_empty_following() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    let out = registry.dispatch(
        &ctx,
        &inbound(json!({"type": "fetchRepositories", "id": "f1"})),
    );
    // No followed repositories: just the completion summary.
    assert_eq!(out.len(), 1);
    let value = serde_json::to_value(&out[0]).unwrap();
    assert_eq!(value["type"], "fetchCompleted");
    assert_eq!(value["data"]["fetched"], 0);
    assert_eq!(value["data"]["failed"], 0);
    assert_eq!(value["requestId"], "f1");
}

#[test]
fn test_fetch_streams_progress_then_completion() {
    let other = TempDir::new().unwrap();
    git::init(other.path(), "main").unwrap();
    git::config_set(other.path(), "user.name", "Friend").unwrap();
    git::config_set(other.path(), "user.email", "friend@example.com").unwrap();
    git::commit_on_branch(other.path(), "social", "hi there").unwrap();

    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    dispatch_one(&ctx, &registry, json!({"type": "list.create", "name": "friends"}));
    dispatch_one(
        &ctx,
        &registry,
        json!({
            "type": "addRepository",
            "list": "friends",
            "url": other.path().to_string_lossy(),
            "branch": "social",
        }),
    );

    let out = registry.dispatch(&ctx, &inbound(json!({"type": "fetchUpdates", "id": "f2"})));
    assert_eq!(out.len(), 2);
    let progress = serde_json::to_value(&out[0]).unwrap();
    let completed = serde_json::to_value(&out[1]).unwrap();
    assert_eq!(progress["type"], "fetchProgress");
    assert_eq!(progress["data"]["ok"], true);
    assert_eq!(completed["type"], "fetchCompleted");
    assert_eq!(completed["data"]["fetched"], 1);
}

#[test]
fn test_fetch_specific_requires_repositories() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    let value = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "fetchSpecificRepositories"}),
    );
    assert_eq!(value["data"]["code"], "VALIDATION_ERROR");
}

#[test]
fn test_unpushed_counts() {
    let (ws, _storage, ctx) = make_ctx();
    let registry = default_registry();
    social::create_post(ws.path(), "not yet pushed").unwrap();

    let value = dispatch_one(&ctx, &registry, json!({"type": "getUnpushedCounts"}));
    assert_eq!(value["type"], "unpushedCounts");
    assert_eq!(value["data"]["posts"], 1);
    assert_eq!(value["data"]["lists"], 0);

    let count = dispatch_one(&ctx, &registry, json!({"type": "getUnpushedListsCount"}));
    assert_eq!(count["data"]["count"], 0);
}

// ─── Misc ───────────────────────────────────────────────────────────

#[test]
fn test_settings_roundtrip() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    let settings = dispatch_one(&ctx, &registry, json!({"type": "getSettings"}));
    assert_eq!(settings["data"]["branch"], "social");

    let updated = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "updateSettings", "branch": "feed", "cacheLimit": 500}),
    );
    assert_eq!(updated["type"], "settingsUpdated");
    assert_eq!(updated["data"]["branch"], "feed");
    assert_eq!(updated["data"]["cacheLimit"], 500);
}

#[test]
fn test_get_avatar() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    let known = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "getAvatar", "email": "7+octo@users.noreply.github.com"}),
    );
    assert_eq!(known["data"]["url"], "https://github.com/octo.png");

    let unknown = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "getAvatar", "email": "alice@example.com"}),
    );
    assert_eq!(unknown["data"]["url"], Value::Null);
}

#[test]
fn test_open_external_validates_scheme() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    let ok = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "openExternal", "url": "https://example.com"}),
    );
    assert_eq!(ok["type"], "externalOpened");

    let bad = dispatch_one(
        &ctx,
        &registry,
        json!({"type": "openExternal", "url": "file:///etc/passwd"}),
    );
    assert_eq!(bad["data"]["code"], "VALIDATION_ERROR");
}

#[test]
fn test_logs_accumulate() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.createPost", "content": "logged"}),
    );
    let value = dispatch_one(&ctx, &registry, json!({"type": "getLogs"}));
    let lines = value["data"]["lines"].as_array().unwrap();
    assert!(lines.iter().any(|l| l.as_str().unwrap().contains("post created")));
}

#[test]
fn test_followers_and_notifications_empty_by_default() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    let followers = dispatch_one(&ctx, &registry, json!({"type": "getFollowers"}));
    assert_eq!(followers["data"]["followers"], json!([]));

    let notifications = dispatch_one(&ctx, &registry, json!({"type": "getNotifications"}));
    assert_eq!(notifications["data"]["notifications"], json!([]));
}

#[test]
fn test_refresh_reports_cache_state() {
    let (_ws, _storage, ctx) = make_ctx();
    let registry = default_registry();

    dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.createPost", "content": "cached"}),
    );
    dispatch_one(
        &ctx,
        &registry,
        json!({"type": "social.getPosts", "scope": "repository:my", "prefetch": false}),
    );

    let value = dispatch_one(&ctx, &registry, json!({"type": "refresh", "all": true}));
    assert_eq!(value["type"], "refreshed");
    assert_eq!(value["data"]["totalPosts"], 1);
}
