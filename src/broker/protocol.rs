//! Broker message envelopes.
//!
//! Inbound: `{ type, id?, panel?, … }` — extra members are the request
//! parameters. Outbound: `{ type, data?, requestId?, panel? }`; the
//! broker echoes the inbound `id` as `requestId` so callers can pair
//! responses deterministically.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SocialError;

/// Incoming message from a UI surface.
#[derive(Clone, Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    /// Correlation id; responses carry it back as `requestId`.
    #[serde(default)]
    pub id: Option<String>,
    /// Originating panel, when the surface is panel-scoped.
    #[serde(default)]
    pub panel: Option<String>,
    /// Everything else: request parameters.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl InboundMessage {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }

    pub fn bool_param(&self, name: &str) -> Option<bool> {
        self.param(name).and_then(Value::as_bool)
    }

    pub fn usize_param(&self, name: &str) -> Option<usize> {
        self.param(name).and_then(Value::as_u64).map(|v| v as usize)
    }

    pub fn str_list_param(&self, name: &str) -> Vec<String> {
        self.param(name)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Outgoing message to a UI surface.
#[derive(Clone, Debug, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Destination panel; `None` means the requesting surface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel: Option<String>,
}

impl OutboundMessage {
    /// A response correlated to a request (`requestId` omitted when the
    /// request carried no id).
    pub fn reply(message_type: &str, data: Value, request_id: Option<&str>) -> Self {
        Self {
            message_type: message_type.to_string(),
            data: Some(data),
            request_id: request_id.map(str::to_string),
            panel: None,
        }
    }

    /// An uncorrelated event.
    pub fn event(message_type: &str, data: Value) -> Self {
        Self {
            message_type: message_type.to_string(),
            data: Some(data),
            request_id: None,
            panel: None,
        }
    }

    /// The error envelope: humanized message plus the stable code.
    pub fn error(error: &SocialError, request_id: Option<&str>) -> Self {
        Self {
            message_type: "error".to_string(),
            data: Some(serde_json::json!({
                "message": error.to_string(),
                "code": error.code(),
            })),
            request_id: request_id.map(str::to_string),
            panel: None,
        }
    }

    pub fn to_panel(mut self, panel: &str) -> Self {
        self.panel = Some(panel.to_string());
        self
    }
}
