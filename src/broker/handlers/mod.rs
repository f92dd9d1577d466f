//! Broker request handlers — a process-wide mapping from message type to
//! handler function.
//!
//! Registration order is immaterial and re-registration replaces; the
//! default registry wires every request type of the public surface.
//! Handlers return their response messages; failures become the standard
//! `{type:"error", data:{message, code}, requestId}` envelope.

mod lists;
mod misc;
mod posts;
mod repos;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use crate::broker::protocol::{InboundMessage, OutboundMessage};
use crate::cache::PostCache;
use crate::error::{Result, SocialError};
use crate::fetch::FetchCoordinator;
use crate::git;
use crate::store::repos::RepoStore;
use crate::timeline::TimelineService;

/// Bounded ring of recent broker log lines served by `getLogs`.
const LOG_CAPACITY: usize = 500;

/// Shared state every handler sees.
pub struct HandlerContext {
    pub workdir: PathBuf,
    pub timeline: TimelineService,
    logs: Mutex<VecDeque<String>>,
}

impl HandlerContext {
    /// Wire the full stack: repository store under `storage_root`, post
    /// cache bounded by `gitsocial.cachelimit`, coordinator, timeline.
    pub fn new(workdir: PathBuf, storage_root: PathBuf) -> Self {
        let cache_limit = git::config_get(&workdir, "gitsocial.cachelimit")
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(crate::cache::DEFAULT_CACHE_LIMIT);

        let store = Arc::new(RepoStore::new(storage_root));
        let cache = Arc::new(RwLock::new(PostCache::new(cache_limit)));
        let coordinator = Arc::new(FetchCoordinator::new(store, cache));

        Self {
            workdir,
            timeline: TimelineService::new(coordinator),
            logs: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
        }
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        self.timeline.coordinator()
    }

    pub fn log(&self, line: impl Into<String>) {
        let mut logs = self.logs.lock().expect("log ring poisoned");
        if logs.len() == LOG_CAPACITY {
            logs.pop_front();
        }
        logs.push_back(line.into());
    }

    pub fn recent_logs(&self) -> Vec<String> {
        self.logs.lock().expect("log ring poisoned").iter().cloned().collect()
    }
}

/// A request handler. Returned messages go back to the requesting panel.
pub type HandlerFn = fn(&HandlerContext, &InboundMessage) -> Result<Vec<OutboundMessage>>;

/// Message-type → handler mapping. Re-registration replaces.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, message_type: &str, handler: HandlerFn) {
        self.handlers.insert(message_type.to_string(), handler);
    }

    pub fn contains(&self, message_type: &str) -> bool {
        self.handlers.contains_key(message_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Dispatch one request. Unknown types and handler failures come back
    /// as error envelopes correlated to the request.
    pub fn dispatch(&self, ctx: &HandlerContext, msg: &InboundMessage) -> Vec<OutboundMessage> {
        let request_id = msg.id.as_deref();

        let Some(handler) = self.handlers.get(&msg.message_type) else {
            let err = SocialError::Validation(format!(
                "unknown message type '{}'",
                msg.message_type
            ));
            return vec![OutboundMessage::error(&err, request_id)];
        };

        match handler(ctx, msg) {
            Ok(mut responses) => {
                // Correlate every response that the handler did not
                // correlate itself.
                for response in &mut responses {
                    if response.request_id.is_none() {
                        response.request_id = request_id.map(str::to_string);
                    }
                }
                responses
            }
            Err(e) => {
                tracing::warn!(message_type = %msg.message_type, error = %e, "handler failed");
                ctx.log(format!("{}: {} ({})", msg.message_type, e, e.code()));
                vec![OutboundMessage::error(&e, request_id)]
            }
        }
    }
}

/// The full public surface.
pub fn default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register("social.getPosts", posts::get_posts);
    registry.register("social.createPost", posts::create_post);
    registry.register("social.createInteraction", posts::create_interaction);
    registry.register("social.searchPosts", posts::search_posts);

    registry.register("list.getAll", lists::get_all);
    registry.register("list.create", lists::create);
    registry.register("list.rename", lists::rename);
    registry.register("list.delete", lists::delete);
    registry.register("list.follow", lists::follow);
    registry.register("list.sync", lists::sync);
    registry.register("list.unfollow", lists::unfollow);
    registry.register("list.history", lists::history);
    registry.register("addRepository", lists::add_repository);
    registry.register("removeRepository", lists::remove_repository);

    registry.register("fetchRepositories", repos::fetch_repositories);
    registry.register("fetchUpdates", repos::fetch_repositories);
    registry.register("fetchSpecificRepositories", repos::fetch_specific);
    registry.register("fetchListRepositories", repos::fetch_list);
    registry.register("pushToRemote", repos::push_to_remote);
    registry.register("getUnpushedCounts", repos::get_unpushed_counts);
    registry.register("getUnpushedListsCount", repos::get_unpushed_lists_count);

    registry.register("getLogs", misc::get_logs);
    registry.register("getNotifications", misc::get_notifications);
    registry.register("getFollowers", misc::get_followers);
    registry.register("getAvatar", misc::get_avatar);
    registry.register("openExternal", misc::open_external);
    registry.register("getSettings", misc::get_settings);
    registry.register("updateSettings", misc::update_settings);
    registry.register("refresh", misc::refresh);

    registry
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
