//! Handlers for fetch and push operations.
//!
//! Batch fetches stream one `fetchProgress` per repository followed by a
//! `fetchCompleted` summary; pushes mirror that with `pushProgress` and
//! `pushCompleted`.

use serde_json::json;

use crate::broker::protocol::{InboundMessage, OutboundMessage};
use crate::error::{Result, SocialError};
use crate::fetch::{FetchSummary, Scope};
use crate::social;

use super::HandlerContext;

fn progress_stream(summary: &FetchSummary) -> Vec<OutboundMessage> {
    let mut messages: Vec<OutboundMessage> = summary
        .outcomes
        .iter()
        .map(|outcome| OutboundMessage::event("fetchProgress", json!(outcome)))
        .collect();

    messages.push(OutboundMessage::reply(
        "fetchCompleted",
        json!({ "fetched": summary.fetched, "failed": summary.failed }),
        None,
    ));
    messages
}

/// `fetchRepositories` / `fetchUpdates` → `fetchProgress`* + `fetchCompleted`
pub fn fetch_repositories(
    ctx: &HandlerContext,
    msg: &InboundMessage,
) -> Result<Vec<OutboundMessage>> {
    let scope = match msg.str_param("scope") {
        None => Scope::Timeline,
        Some(raw) => Scope::parse(raw)
            .ok_or_else(|| SocialError::Validation(format!("unknown scope '{}'", raw)))?,
    };

    let summary = ctx.coordinator().fetch_updates(&ctx.workdir, &scope)?;
    ctx.log(format!(
        "fetch: {} ok, {} failed",
        summary.fetched, summary.failed
    ));
    Ok(progress_stream(&summary))
}

/// `fetchSpecificRepositories` → `fetchProgress`* + `fetchCompleted`
pub fn fetch_specific(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let repositories = msg.str_list_param("repositories");
    if repositories.is_empty() {
        return Err(SocialError::Validation("missing 'repositories'".to_string()));
    }

    let mut summary = FetchSummary::default();
    for identity in repositories {
        let (url, branch) = gitsocial::split_identity(&identity);
        match ctx.coordinator().refresh_repository(&url, branch.as_deref()) {
            Ok(()) => {
                summary.fetched += 1;
                summary.outcomes.push(crate::fetch::FetchOutcome {
                    repository: url,
                    ok: true,
                    error: None,
                });
            }
            Err(e) => {
                summary.failed += 1;
                summary.outcomes.push(crate::fetch::FetchOutcome {
                    repository: url,
                    ok: false,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    Ok(progress_stream(&summary))
}

/// `fetchListRepositories` → `fetchProgress`* + `fetchCompleted`
pub fn fetch_list(ctx: &HandlerContext, msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let list = msg
        .str_param("list")
        .ok_or_else(|| SocialError::Validation("missing 'list'".to_string()))?;

    let summary = ctx
        .coordinator()
        .fetch_updates(&ctx.workdir, &Scope::List(list.to_string()))?;
    Ok(progress_stream(&summary))
}

/// `pushToRemote` → `pushProgress` + `pushCompleted`
pub fn push_to_remote(ctx: &HandlerContext, _msg: &InboundMessage) -> Result<Vec<OutboundMessage>> {
    let progress = OutboundMessage::event("pushProgress", json!({ "stage": "pushing" }));
    let pushed = social::push_to_remote(&ctx.workdir)?;
    ctx.log(format!(
        "pushed {} posts and {} lists",
        pushed.posts, pushed.lists
    ));

    Ok(vec![
        progress,
        OutboundMessage::reply("pushCompleted", json!(pushed), None),
    ])
}

/// `getUnpushedCounts` → `unpushedCounts`
pub fn get_unpushed_counts(
    ctx: &HandlerContext,
    _msg: &InboundMessage,
) -> Result<Vec<OutboundMessage>> {
    let counts = social::unpushed_counts(&ctx.workdir)?;
    Ok(vec![OutboundMessage::reply("unpushedCounts", json!(counts), None)])
}

/// `getUnpushedListsCount` → `unpushedListsCount`
pub fn get_unpushed_lists_count(
    ctx: &HandlerContext,
    _msg: &InboundMessage,
) -> Result<Vec<OutboundMessage>> {
    let count = social::unpushed_lists_count(&ctx.workdir)?;
    Ok(vec![OutboundMessage::reply(
        "unpushedListsCount",
        json!({ "count": count }),
        None,
    )])
}
