//! Handlers for the `social.*` post surface.

use chrono::{DateTime, Days, Utc};
use serde_json::json;

use crate::broker::protocol::{InboundMessage, OutboundMessage};
use crate::cache::Post;
use crate::error::{Result, SocialError};
use crate::fetch::Scope;
use crate::protocol::PostType;
use crate::social;
use crate::timeline::{self, WeekOptions};

use super::HandlerContext;

fn parse_timestamp(msg: &InboundMessage, name: &str) -> Result<Option<DateTime<Utc>>> {
    match msg.str_param(name) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| SocialError::Validation(format!("bad {} '{}': {}", name, raw, e))),
    }
}

fn parse_types(msg: &InboundMessage) -> Result<Option<Vec<PostType>>> {
    let raw = msg.str_list_param("types");
    if raw.is_empty() {
        return Ok(None);
    }
    raw.iter()
        .map(|s| {
            serde_json::from_value::<PostType>(json!(s))
                .map_err(|_| SocialError::Validation(format!("unknown post type '{}'", s)))
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn parse_scope(msg: &InboundMessage) -> Result<Scope> {
    match msg.str_param("scope") {
        None => Ok(Scope::Timeline),
        Some(raw) => Scope::parse(raw)
            .ok_or_else(|| SocialError::Validation(format!("unknown scope '{}'", raw))),
    }
}

/// `social.getPosts` → `posts`
pub fn get_posts(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let week_end = parse_timestamp(msg, "weekEnd")?.unwrap_or_else(Utc::now);
    let week_start =
        parse_timestamp(msg, "weekStart")?.unwrap_or_else(|| week_end - Days::new(7));

    let opts = WeekOptions {
        scope: parse_scope(msg)?,
        types: parse_types(msg)?,
        fetch: msg.bool_param("fetch").unwrap_or(true),
        prefetch: msg.bool_param("prefetch").unwrap_or(true),
    };

    let week = ctx
        .timeline
        .get_week_posts(&ctx.workdir, week_start, week_end, &opts)?;
    let stats = timeline::get_timeline_stats(&week.posts);

    Ok(vec![OutboundMessage::reply(
        "posts",
        json!({
            "posts": week.posts,
            "repositories": week.repositories,
            "stats": stats,
        }),
        None,
    )])
}

/// `social.createPost` → `postCreated`
pub fn create_post(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let content = msg
        .str_param("content")
        .ok_or_else(|| SocialError::Validation("missing 'content'".to_string()))?;

    let hash = social::create_post(&ctx.workdir, content)?;
    ctx.log(format!("post created: {}", &hash[..12]));

    Ok(vec![OutboundMessage::reply(
        "postCreated",
        json!({ "id": format!("#commit:{}", &hash[..12]), "hash": hash }),
        None,
    )])
}

/// Find a post anywhere in the cache by its `#commit:` id.
fn find_post(ctx: &HandlerContext, id: &str) -> Option<Post> {
    let cache = ctx.coordinator().cache().read().expect("post cache poisoned");
    cache
        .repositories()
        .into_iter()
        .flat_map(|repo| cache.posts_for(&repo).to_vec())
        .find(|p| p.id == id)
}

/// `social.createInteraction` → `interactionCreated`
pub fn create_interaction(
    ctx: &HandlerContext,
    msg: &InboundMessage,
) -> Result<Vec<OutboundMessage>> {
    let kind_raw = msg
        .str_param("kind")
        .or_else(|| msg.str_param("type"))
        .ok_or_else(|| SocialError::Validation("missing interaction 'kind'".to_string()))?;
    let kind: PostType = serde_json::from_value(json!(kind_raw))
        .map_err(|_| SocialError::Validation(format!("unknown interaction kind '{}'", kind_raw)))?;

    let target_id = msg
        .str_param("target")
        .ok_or_else(|| SocialError::Validation("missing 'target'".to_string()))?;
    let target = find_post(ctx, target_id)
        .ok_or_else(|| SocialError::Validation(format!("unknown target post '{}'", target_id)))?;

    let content = msg.str_param("content").unwrap_or_default();
    let hash = social::create_interaction(&ctx.workdir, kind, &target, content)?;
    ctx.log(format!("{} created on {}", kind, target_id));

    Ok(vec![OutboundMessage::reply(
        "interactionCreated",
        json!({
            "id": format!("#commit:{}", &hash[..12]),
            "target": target_id,
            "kind": kind,
        }),
        None,
    )])
}

/// `social.searchPosts` → `searchResults`
pub fn search_posts(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let query = msg
        .str_param("query")
        .ok_or_else(|| SocialError::Validation("missing 'query'".to_string()))?;
    let max_results = msg.usize_param("maxResults").unwrap_or(100);

    let posts = ctx.timeline.search_posts(query, max_results);
    Ok(vec![OutboundMessage::reply(
        "searchResults",
        json!({ "query": query, "posts": posts }),
        None,
    )])
}
