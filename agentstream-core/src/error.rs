use thiserror::Error;

/// Core error type for agentstream.
/// Internally, modules can use `anyhow::Result<T>` for convenience,
/// but public boundaries should expose `CoreResult<T>` with this error.
///
/// Text extraction and chunk attribution never produce these; they always
/// degrade to the best available text.
#[derive(Debug, Error)]
pub enum AgentStreamError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("agent server returned {code}: {message}")]
    Upstream { code: String, message: String },

    #[error("payload decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentStreamError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, AgentStreamError>;
