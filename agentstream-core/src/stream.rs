//! Streaming primitives consumed by a session.
//!
//! Contract:
//! - The transport delivers 0..n `Data` events, one SSE payload each.
//! - A `Data` payload equal to [`DONE_SENTINEL`] ends the stream normally.
//! - `Error` ends the stream abnormally. After either, the session ignores
//!   further events.

use serde::Deserialize;

use crate::error::{AgentStreamError, CoreResult};

pub const DONE_SENTINEL: &str = "[DONE]";

/// One transport event, dispatched into a session strictly one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Data(String),
    Error(String),
}

/// A decoded stream payload.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamPayload {
    Token {
        #[serde(default)]
        source: String,
        #[serde(default)]
        namespace: NamespaceField,
        #[serde(default)]
        content: String,
        #[serde(default)]
        metadata: serde_json::Value,
    },
    Update {
        #[serde(default)]
        data: serde_json::Value,
    },
    Custom {
        #[serde(default)]
        event: serde_json::Value,
    },
    Unknown {
        #[serde(default)]
        data: serde_json::Value,
    },
    /// Server-side failure; the server follows it with the sentinel.
    Error {
        #[serde(default)]
        content: String,
    },
}

/// Subagent namespaces arrive as a string or a list of path segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NamespaceField {
    #[default]
    Root,
    Name(String),
    Path(Vec<String>),
}

impl NamespaceField {
    pub fn render(&self) -> String {
        match self {
            Self::Root => String::new(),
            Self::Name(s) => s.clone(),
            Self::Path(p) => p.join("/"),
        }
    }
}

pub fn parse_payload(data: &str) -> CoreResult<StreamPayload> {
    serde_json::from_str(data).map_err(|e| AgentStreamError::Decode(e.to_string()))
}
