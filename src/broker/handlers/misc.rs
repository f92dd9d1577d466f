//! Handlers for settings, logs, notifications, and small lookups.

use serde_json::json;

use crate::broker::protocol::{InboundMessage, OutboundMessage};
use crate::error::{Result, SocialError};
use crate::git;
use crate::social;
use crate::store::repos::default_storage_root;
use crate::timeline::workspace_identity;

use super::HandlerContext;

/// `getLogs` → `logs`
pub fn get_logs(ctx: &HandlerContext, _msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    Ok(vec![OutboundMessage::reply(
        "logs",
        json!({ "lines": ctx.recent_logs() }),
        None,
    )])
}

/// `getNotifications` → `notifications`
pub fn get_notifications(
    ctx: &HandlerContext,
    _msg: &InboundMessage,
) -> Result<Vec<OutboundMessage>> {
    let workspace = workspace_identity(&ctx.workdir);
    let cache = ctx.coordinator().cache().read().expect("post cache poisoned");
    let notifications = social::notifications(&cache, &workspace);

    Ok(vec![OutboundMessage::reply(
        "notifications",
        json!({ "notifications": notifications }),
        None,
    )])
}

/// `getFollowers` → `followers`
pub fn get_followers(ctx: &HandlerContext, _msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let followers = social::get_followers(&ctx.workdir)?;
    Ok(vec![OutboundMessage::reply(
        "followers",
        json!({ "followers": followers }),
        None,
    )])
}

/// `getAvatar` → `avatar`. Resolution is pure derivation; there is
/// nothing to fail, so unknown emails simply resolve to no URL.
pub fn get_avatar(_ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let email = msg
        .str_param("email")
        .ok_or_else(|| SocialError::Validation("missing 'email'".to_string()))?;

    Ok(vec![OutboundMessage::reply(
        "avatar",
        json!({ "email": email, "url": social::avatar_url(email) }),
        None,
    )])
}

/// `openExternal` → `externalOpened`. The broker validates the URL
/// shape; actually opening it is the embedder's job.
pub fn open_external(_ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let url = msg
        .str_param("url")
        .ok_or_else(|| SocialError::Validation("missing 'url'".to_string()))?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(SocialError::Validation(format!("refusing to open '{}'", url)));
    }

    Ok(vec![OutboundMessage::reply("externalOpened", json!({ "url": url }), None)])
}

fn settings_value(ctx: &HandlerContext) -> Result<serde_json::Value> {
    let storage = git::config_get(&ctx.workdir, "gitsocial.storage")?
        .unwrap_or_else(|| default_storage_root().to_string_lossy().into_owned());
    let branch = social::social_branch(&ctx.workdir);
    let cache_limit = git::config_get(&ctx.workdir, "gitsocial.cachelimit")?
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(crate::cache::DEFAULT_CACHE_LIMIT);

    Ok(json!({
        "storage": storage,
        "branch": branch,
        "cacheLimit": cache_limit,
    }))
}

/// `getSettings` → `settings`
pub fn get_settings(ctx: &HandlerContext, _msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    Ok(vec![OutboundMessage::reply("settings", settings_value(ctx)?, None)])
}

/// `updateSettings` → `settingsUpdated`
pub fn update_settings(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    if let Some(branch) = msg.str_param("branch") {
        git::config_set(&ctx.workdir, "gitsocial.branch", branch)?;
    }
    if let Some(storage) = msg.str_param("storage") {
        git::config_set(&ctx.workdir, "gitsocial.storage", storage)?;
    }
    if let Some(limit) = msg.usize_param("cacheLimit") {
        git::config_set(&ctx.workdir, "gitsocial.cachelimit", &limit.to_string())?;
    }
    ctx.log("settings updated".to_string());

    Ok(vec![OutboundMessage::reply("settingsUpdated", settings_value(ctx)?, None)])
}

/// `refresh` → `refreshed`. Selector: `{all?, repositories?, lists?}`.
pub fn refresh(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let all = msg.bool_param("all").unwrap_or(false);
    let repositories = msg.str_list_param("repositories");
    let lists = msg.str_list_param("lists");

    ctx.coordinator()
        .refresh_cache(&ctx.workdir, all, &repositories, &lists)?;

    let cache = ctx.coordinator().cache().read().expect("post cache poisoned");
    Ok(vec![OutboundMessage::reply(
        "refreshed",
        json!({ "repositories": cache.repositories(), "totalPosts": cache.total_posts() }),
        None,
    )])
}
