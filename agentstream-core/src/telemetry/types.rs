use serde::{Deserialize, Serialize};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Completed,
    Errored,
    Cancelled,
}

/// Summary of one stream session, recorded once when it ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTrace {
    pub goal: String,
    pub outcome: SessionOutcome,

    /// Transport data events seen, sentinel excluded.
    pub increments: u64,
    /// Chunks released by the boundary parser.
    pub chunks: u64,
    /// Increments dropped as malformed.
    pub dropped: u64,

    pub task_count: usize,
    pub flushes: usize,

    pub error_message: Option<String>,
}

impl SessionTrace {
    pub fn new(goal: impl Into<String>, outcome: SessionOutcome) -> Self {
        Self {
            goal: goal.into(),
            outcome,
            increments: 0,
            chunks: 0,
            dropped: 0,
            task_count: 0,
            flushes: 0,
            error_message: None,
        }
    }

    pub fn counts(mut self, increments: u64, chunks: u64, dropped: u64) -> Self {
        self.increments = increments;
        self.chunks = chunks;
        self.dropped = dropped;
        self
    }

    pub fn tasks(mut self, task_count: usize, flushes: usize) -> Self {
        self.task_count = task_count;
        self.flushes = flushes;
        self
    }

    pub fn error_message_opt(mut self, msg: Option<&str>) -> Self {
        self.error_message = msg.map(|s| s.to_string());
        self
    }
}
