//! Cross-context Bridge
//!
//! Request/response protocol between the popup and the page. Every request
//! gets exactly one JSON response; failures are `{error}` payloads, never
//! panics. All responses are produced synchronously.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::dom::Dom;
use crate::session::Session;
use crate::types::Stats;
use crate::visibility::FlagStore;

pub const ERR_NOT_INITIALIZED: &str = "Extension not initialized";
pub const ERR_UNKNOWN_ACTION: &str = "Unknown action";

/// Message listeners must tell the host up front whether `sendResponse` will
/// be called later. The bridge always answers before returning.
pub const RESPONDS_ASYNCHRONOUSLY: bool = false;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "camelCase")]
#[ts(export)]
pub enum Request {
    /// Set the flag to `enabled` and re-apply visibility
    Toggle { enabled: bool },
    /// Read-only counters
    GetStats,
    /// Force the flag off and persist it
    ShowAll,
    /// Force the flag on and persist it
    HideAll,
}

impl Request {
    const ACTIONS: [&'static str; 4] = ["toggle", "getStats", "showAll", "hideAll"];

    /// Decode a raw message. Unrecognized actions and malformed known ones
    /// come back as the error response to send.
    pub fn parse(raw: &Value) -> Result<Self, Response> {
        let action = raw.get("action").and_then(Value::as_str).unwrap_or_default();
        if !Self::ACTIONS.contains(&action) {
            return Err(Response::error(ERR_UNKNOWN_ACTION));
        }
        serde_json::from_value(raw.clone())
            .map_err(|e| Response::error(format!("Invalid {} request: {}", action, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum Response {
    Stats { stats: Stats },
    Success { success: bool },
    Error { error: String },
}

impl Response {
    pub fn ok() -> Self {
        Self::Success { success: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { error: message.into() }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }
}

/// Answer one raw request against the active session, if any.
pub fn dispatch<D: Dom, S: FlagStore>(session: Option<&mut Session<D, S>>, raw: &Value) -> Response {
    let Some(session) = session else {
        return Response::error(ERR_NOT_INITIALIZED);
    };
    match Request::parse(raw) {
        Ok(request) => handle(session, request),
        Err(response) => {
            log::debug!("Rejected bridge message {}", raw);
            response
        }
    }
}

pub fn handle<D: Dom, S: FlagStore>(session: &mut Session<D, S>, request: Request) -> Response {
    match request {
        Request::Toggle { enabled } => session.set_enabled(enabled),
        Request::GetStats => return Response::Stats { stats: session.stats() },
        Request::ShowAll => session.set_enabled(false),
        Request::HideAll => session.set_enabled(true),
    }
    Response::ok()
}
