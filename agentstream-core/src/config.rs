use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{AgentStreamError, CoreResult};
use crate::keywords::DEFAULT_KEYWORD_PATTERNS;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerCfg {
    /// Base URL of the agent server, without trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_run_path")]
    pub run_path: String,
    /// Forwarded as the `stream_mode` query parameter.
    #[serde(default = "default_stream_mode")]
    pub stream_mode: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Default for ServerCfg {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            run_path: default_run_path(),
            stream_mode: default_stream_mode(),
            user_id: None,
            session_id: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_stream_path() -> String {
    "/run-agent-stream".into()
}
fn default_run_path() -> String {
    "/run-agent".into()
}
fn default_stream_mode() -> String {
    "messages".into()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HttpCfg {
    /// TCP connect timeout in milliseconds (default 5000ms)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Total timeout for non-streaming requests in milliseconds (default 60000ms).
    /// Streaming requests are bounded by the connect timeout only.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Optional per-host idle connection pool cap (None = reqwest default)
    #[serde(default)]
    pub pool_max_idle_per_host: Option<usize>,
}

impl Default for HttpCfg {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_max_idle_per_host: None,
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AttributionCfg {
    /// Ordered keyword probes applied to each task description. Each regex
    /// must have a capture group; group 1 becomes the keyword.
    #[serde(default = "default_keyword_patterns")]
    pub keyword_patterns: Vec<String>,
}

impl Default for AttributionCfg {
    fn default() -> Self {
        Self {
            keyword_patterns: default_keyword_patterns(),
        }
    }
}

fn default_keyword_patterns() -> Vec<String> {
    DEFAULT_KEYWORD_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerCfg,
    /// HTTP client configuration (timeouts, pooling). Missing → defaults.
    #[serde(default)]
    pub http: HttpCfg,
    #[serde(default)]
    pub attribution: AttributionCfg,
}

impl Config {
    /// Load a Config from a file path (JSON or TOML by extension). If the
    /// extension is missing or unrecognized, try JSON first, then TOML.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(AgentStreamError::from)?;
        let s = std::str::from_utf8(&bytes).map_err(|e| AgentStreamError::Other(e.into()))?;
        let cfg: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                serde_json::from_str::<Self>(s).map_err(|e| AgentStreamError::Other(e.into()))?
            }
            Some("toml") => {
                toml::from_str::<Self>(s).map_err(|e| AgentStreamError::Other(e.into()))?
            }
            _ => serde_json::from_str::<Self>(s)
                .map_err(|e| AgentStreamError::Other(e.into()))
                .or_else(|_| {
                    toml::from_str::<Self>(s).map_err(|e| AgentStreamError::Other(e.into()))
                })?,
        };
        Ok(cfg)
    }

    pub fn stream_url(&self) -> String {
        format!("{}{}", self.server.base_url, self.server.stream_path)
    }

    pub fn run_url(&self) -> String {
        format!("{}{}", self.server.base_url, self.server.run_path)
    }
}
