//! Collaborators a stream session talks to.
//!
//! Rendering, task bookkeeping, result publishing and history persistence live
//! outside the core; a session only needs these seams. [`MemoryHost`] records
//! everything and backs the tests.

use crate::model::{FinalResult, StreamChunk, Task, TaskStatus};
use crate::todos;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Error,
    Streaming,
    /// Per-task status label, used when listing tasks.
    Status(TaskStatus),
}

pub trait LogSink {
    fn log(&mut self, level: LogLevel, text: &str);

    /// Render one live chunk.
    fn show_chunk(&mut self, _chunk: &StreamChunk) {}

    /// Start a new visual container for subsequent output.
    fn reset_stream(&mut self) {}
}

pub trait TaskListProvider {
    fn current_tasks(&self) -> Vec<Task>;

    /// Called with token content that announced a todo-list update, before the
    /// session re-reads `current_tasks`.
    fn observe_update(&mut self, _content: &str) {}

    /// Wholesale replacement, e.g. from tool-call arguments.
    fn replace_tasks(&mut self, _tasks: Vec<Task>) {}

    /// Called once when a stream finishes normally.
    fn finalize_on_completion(&mut self) {}
}

pub trait ResultSink {
    fn publish(&mut self, result: FinalResult);
}

pub trait HistoryHook {
    /// Fire-and-forget.
    fn save_history(&mut self) {}
}

/// Owned by exactly one session; closing releases the connection.
pub trait Transport {
    fn close(&mut self);
}

/// Everything a session needs from its surroundings.
pub trait SessionHost: LogSink + TaskListProvider + ResultSink + HistoryHook {}

impl<T: LogSink + TaskListProvider + ResultSink + HistoryHook> SessionHost for T {}

/// In-memory task list that understands todo-update announcements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTaskList {
    tasks: Vec<Task>,
}

impl MemoryTaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Task::reindex(tasks),
        }
    }
}

impl TaskListProvider for MemoryTaskList {
    fn current_tasks(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    fn observe_update(&mut self, content: &str) {
        match todos::parse_todo_update(content) {
            Some(tasks) => self.tasks = tasks,
            None => tracing::warn!("todo update announced but list could not be parsed"),
        }
    }

    fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks = Task::reindex(tasks);
    }

    fn finalize_on_completion(&mut self) {
        for t in &mut self.tasks {
            if !t.status.is_finished() {
                t.status = TaskStatus::Completed;
            }
        }
    }
}

/// Records every interaction; used by tests and offline replay.
#[derive(Debug, Default)]
pub struct MemoryHost {
    pub logs: Vec<(LogLevel, String)>,
    pub chunks: Vec<StreamChunk>,
    pub stream_resets: usize,
    pub tasks: MemoryTaskList,
    pub results: Vec<FinalResult>,
    pub history_saves: usize,
}

impl MemoryHost {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: MemoryTaskList::new(tasks),
            ..Default::default()
        }
    }

    /// Texts logged at `level`, in order.
    pub fn logged(&self, level: &LogLevel) -> Vec<&str> {
        self.logs
            .iter()
            .filter(|(l, _)| l == level)
            .map(|(_, t)| t.as_str())
            .collect()
    }
}

impl LogSink for MemoryHost {
    fn log(&mut self, level: LogLevel, text: &str) {
        self.logs.push((level, text.to_string()));
    }

    fn show_chunk(&mut self, chunk: &StreamChunk) {
        self.chunks.push(chunk.clone());
    }

    fn reset_stream(&mut self) {
        self.stream_resets += 1;
    }
}

impl TaskListProvider for MemoryHost {
    fn current_tasks(&self) -> Vec<Task> {
        self.tasks.current_tasks()
    }

    fn observe_update(&mut self, content: &str) {
        self.tasks.observe_update(content);
    }

    fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.tasks.replace_tasks(tasks);
    }

    fn finalize_on_completion(&mut self) {
        self.tasks.finalize_on_completion();
    }
}

impl ResultSink for MemoryHost {
    fn publish(&mut self, result: FinalResult) {
        self.results.push(result);
    }
}

impl HistoryHook for MemoryHost {
    fn save_history(&mut self) {
        self.history_saves += 1;
    }
}
