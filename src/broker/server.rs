//! Broker event loop over stdio.
//!
//! One JSON message per line on stdin, one per line on stdout; logging
//! goes to stderr so the protocol stream stays clean. A handful of
//! panel-lifecycle messages are handled by the broker itself; everything
//! else goes through the handler registry.

use std::io::{self, BufRead, Write};

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::broker::handlers::{HandlerContext, HandlerRegistry};
use crate::broker::panels::{PanelRegistry, ViewParams};
use crate::broker::protocol::{InboundMessage, OutboundMessage};

/// The always-present host surface that receives every broadcast.
const SIDEBAR: &str = "sidebar";

/// Run the broker loop until stdin closes.
pub fn run_server(ctx: HandlerContext, registry: HandlerRegistry) {
    let mut panels = PanelRegistry::new();

    let stdin = io::stdin();
    let reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    info!(workdir = %ctx.workdir.display(), "broker ready, waiting for messages on stdin");

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!(error = %e, "error reading stdin");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!(request = %line, "incoming message");

        let message: InboundMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "unparseable message");
                let err = crate::error::SocialError::Validation(format!("parse error: {}", e));
                let out = OutboundMessage::error(&err, None);
                write_message(&mut writer, &out);
                continue;
            }
        };

        for out in handle_message(&ctx, &registry, &mut panels, &message) {
            // Responses to a panel disposed in the meantime are dropped.
            if let Some(panel) = out.panel.as_deref() {
                if panel != SIDEBAR && panels.get(panel).is_none() {
                    debug!(panel, "dropping response to disposed panel");
                    continue;
                }
            }
            write_message(&mut writer, &out);
        }
    }

    info!("stdin closed, shutting down");
}

fn write_message(writer: &mut impl Write, message: &OutboundMessage) {
    match serde_json::to_string(message) {
        Ok(line) => {
            debug!(response = %line, "outgoing message");
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
        Err(e) => error!(error = %e, "unserializable outbound message"),
    }
}

/// Deliver a message to every open panel and the sidebar.
fn post_to_all(panels: &PanelRegistry, message: OutboundMessage) -> Vec<OutboundMessage> {
    let mut out: Vec<OutboundMessage> = panels
        .ids()
        .into_iter()
        .map(|id| message.clone().to_panel(&id))
        .collect();
    out.push(message.to_panel(SIDEBAR));
    out
}

fn active_panel_broadcast(panels: &PanelRegistry) -> Vec<OutboundMessage> {
    let active = panels.active_panel().unwrap_or("");
    post_to_all(
        panels,
        OutboundMessage::event("setActivePanel", json!({ "panel": active })),
    )
}

/// Handle one inbound message: broker-internal lifecycle first, handler
/// registry for everything else.
pub fn handle_message(
    ctx: &HandlerContext,
    registry: &HandlerRegistry,
    panels: &mut PanelRegistry,
    msg: &InboundMessage,
) -> Vec<OutboundMessage> {
    let request_id = msg.id.as_deref();

    match msg.message_type.as_str() {
        "ready" => {
            let reply = OutboundMessage::reply(
                "init",
                json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "workdir": ctx.workdir.display().to_string(),
                    "activePanel": panels.active_panel(),
                }),
                request_id,
            );
            vec![attach_panel(reply, msg)]
        }

        "openView" => {
            let Some(view) = msg.str_param("view") else {
                let err = crate::error::SocialError::Validation("missing 'view'".to_string());
                return vec![attach_panel(OutboundMessage::error(&err, request_id), msg)];
            };
            let params = ViewParams {
                url: msg.str_param("url").map(str::to_string),
                list: msg.str_param("list").map(str::to_string),
                post: msg.str_param("post").map(str::to_string),
            };

            let (panel, created) = panels.open(view, &params);
            ctx.log(format!("view opened: {} (created: {})", panel, created));

            let mut out = vec![attach_panel(
                OutboundMessage::reply(
                    "viewOpened",
                    json!({ "panel": panel, "created": created }),
                    request_id,
                ),
                msg,
            )];
            out.extend(active_panel_broadcast(panels));
            out
        }

        "updatePanelTitle" => {
            if let (Some(panel), Some(title)) = (msg.str_param("panel"), msg.str_param("title")) {
                panels.set_title(panel, title);
            }
            Vec::new()
        }

        "updatePanelIcon" => {
            if let (Some(panel), Some(icon)) = (msg.str_param("panel"), msg.str_param("icon")) {
                panels.set_icon(panel, icon);
            }
            Vec::new()
        }

        "panelVisibility" => {
            if let Some(panel) = msg.str_param("panel") {
                let visible = msg.bool_param("visible").unwrap_or(true);
                panels.set_visible(panel, visible);
            }
            active_panel_broadcast(panels)
        }

        "closePanel" => {
            if let Some(panel) = msg.str_param("panel") {
                panels.dispose(panel);
                ctx.log(format!("panel closed: {}", panel));
            }
            // Disposal broadcasts an empty active panel.
            active_panel_broadcast(panels)
        }

        _ => registry
            .dispatch(ctx, msg)
            .into_iter()
            .map(|out| attach_panel(out, msg))
            .collect(),
    }
}

/// Route a response back to the requesting panel unless the handler
/// already chose a destination.
fn attach_panel(mut out: OutboundMessage, msg: &InboundMessage) -> OutboundMessage {
    if out.panel.is_none() {
        out.panel = msg.panel.clone();
    }
    out
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
