//! Handlers for the `list.*` surface and repository membership.

use serde_json::json;

use crate::broker::protocol::{InboundMessage, OutboundMessage};
use crate::error::{Result, SocialError};
use crate::social::lists;

use super::HandlerContext;

fn required<'m>(msg: &'m InboundMessage, name: &str) -> Result<&'m str> {
    msg.str_param(name)
        .ok_or_else(|| SocialError::Validation(format!("missing '{}'", name)))
}

/// `list.getAll` → `lists`
pub fn get_all(ctx: &HandlerContext, _msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let lists = lists::get_all(&ctx.workdir)?;
    Ok(vec![OutboundMessage::reply("lists", json!({ "lists": lists }), None)])
}

/// `list.create` → `listCreated`
pub fn create(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let name = required(msg, "name")?;
    let list = lists::create(&ctx.workdir, name)?;
    ctx.log(format!("list created: {}", list.id));
    Ok(vec![OutboundMessage::reply("listCreated", json!({ "list": list }), None)])
}

/// `list.rename` → `listRenamed`
pub fn rename(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let id = required(msg, "id")?;
    let name = required(msg, "name")?;
    let list = lists::rename(&ctx.workdir, id, name)?;
    Ok(vec![OutboundMessage::reply("listRenamed", json!({ "list": list }), None)])
}

/// `list.delete` → `listDeleted`
pub fn delete(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let id = required(msg, "id")?;
    lists::delete(&ctx.workdir, id)?;
    ctx.log(format!("list deleted: {}", id));
    Ok(vec![OutboundMessage::reply("listDeleted", json!({ "id": id }), None)])
}

/// `list.follow` → `listFollowed`
pub fn follow(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let url = required(msg, "url")?;
    let id = required(msg, "id")?;
    let list = lists::follow(&ctx.workdir, ctx.coordinator().store(), url, id)?;
    ctx.log(format!("following list {} from {}", id, url));
    Ok(vec![OutboundMessage::reply("listFollowed", json!({ "list": list }), None)])
}

/// `list.sync` → `listSynced`
pub fn sync(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let id = required(msg, "id")?;
    let list = lists::sync(&ctx.workdir, ctx.coordinator().store(), id)?;
    Ok(vec![OutboundMessage::reply("listSynced", json!({ "list": list }), None)])
}

/// `list.unfollow` → `listUnfollowed`
pub fn unfollow(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let id = required(msg, "id")?;
    lists::unfollow(&ctx.workdir, ctx.coordinator().store(), id)?;
    Ok(vec![OutboundMessage::reply("listUnfollowed", json!({ "id": id }), None)])
}

/// `list.history` → `listHistory`
pub fn history(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let id = required(msg, "id")?;

    let mut window = crate::git::LogWindow::default();
    if let Some(since) = msg.str_param("since") {
        window.since = Some(since.parse().map_err(|e| {
            SocialError::Validation(format!("bad since '{}': {}", since, e))
        })?);
    }
    if let Some(until) = msg.str_param("until") {
        window.until = Some(until.parse().map_err(|e| {
            SocialError::Validation(format!("bad until '{}': {}", until, e))
        })?);
    }

    let entries = crate::store::history(&ctx.workdir, crate::protocol::SOCIAL_EXT, id, &window)?;
    let entries: Vec<serde_json::Value> = entries
        .into_iter()
        .map(|e| {
            json!({
                "hash": e.hash,
                "author": e.author,
                "email": e.email,
                "timestamp": e.timestamp,
                "content": e.content,
            })
        })
        .collect();

    Ok(vec![OutboundMessage::reply(
        "listHistory",
        json!({ "id": id, "entries": entries }),
        None,
    )])
}

/// `addRepository` → `repositoryAdded`
pub fn add_repository(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let list_id = required(msg, "list")?;
    let url = required(msg, "url")?;
    let branch = msg.str_param("branch");

    let list = lists::add_repository(&ctx.workdir, list_id, url, branch)?;
    ctx.log(format!("repository {} added to {}", url, list_id));
    Ok(vec![OutboundMessage::reply("repositoryAdded", json!({ "list": list }), None)])
}

/// `removeRepository` → `repositoryRemoved`
pub fn remove_repository(
    ctx: &HandlerContext,
    msg: &InboundMessage,
) -> Result<Vec<OutboundMessage>> {
    let list_id = required(msg, "list")?;
    let url = required(msg, "url")?;

    let list = lists::remove_repository(&ctx.workdir, list_id, url)?;
    Ok(vec![OutboundMessage::reply("repositoryRemoved", json!({ "list": list }), None)])
}
