/// Span/Log attribute keys for stream sessions.
/// Keep these stable; changing them is a breaking change for dashboards.
pub const KEY_OUTCOME: &str = "session.outcome";

pub const KEY_INCREMENTS: &str = "stream.increments";
pub const KEY_CHUNKS: &str = "stream.chunks";
pub const KEY_DROPPED: &str = "stream.dropped";

pub const KEY_TASK_COUNT: &str = "tasks.count";
pub const KEY_FLUSHES: &str = "tasks.flushes";

/// Error-related (if applicable)
pub const KEY_ERROR_MESSAGE: &str = "error.message";
