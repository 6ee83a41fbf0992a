use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Success,
    Fail,
    #[serde(other)]
    Other,
}

impl TaskStatus {
    /// Finished tasks are left alone by the completion hook.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Success | Self::Fail)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Other => "other",
        }
    }
}

/// One unit of work tracked by the remote agent.
///
/// On the wire a task is the agent's todo (`{content, status}`); `index` is its
/// position in the list and is reassigned by [`Task::reindex`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    #[serde(default)]
    pub index: usize,
    #[serde(rename = "content", alias = "description")]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(index: usize, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            status: TaskStatus::Pending,
        }
    }

    /// Number tasks by their list position.
    pub fn reindex(mut tasks: Vec<Task>) -> Vec<Task> {
        for (i, t) in tasks.iter_mut().enumerate() {
            t.index = i;
        }
        tasks
    }
}

/// A discrete unit of live output handed to the display hook.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    pub source: String,
    pub namespace: String,
    pub content: String,
}

/// Structured outcome of one run, produced once per session or response.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct FinalResult {
    pub phase: String,
    pub result: String,
    pub is_completed: bool,
    #[serde(rename = "todos", default)]
    pub tasks: Vec<Task>,
}
