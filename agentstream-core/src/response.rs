//! Non-streaming run responses.
//!
//! The server answers `/run-agent` with `{success, data}` where `data` is either
//! the agent's message list or a flat `{phase, result, is_completed, todos}`
//! object. Both shapes are logged and reduced to one [`FinalResult`].

use serde::Deserialize;
use serde_json::Value;

use crate::extract::extract_structured_result;
use crate::host::{LogLevel, LogSink, ResultSink, TaskListProvider};
use crate::model::{FinalResult, Task};
use crate::normalizer::normalize_result;
use crate::session::COMPLETED_FALLBACK;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub success: bool,
    pub data: RunData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RunData {
    Messages { messages: Vec<AgentMessage> },
    Flat(FlatResult),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlatResult {
    pub phase: String,
    pub result: String,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub is_simple_and_unrelevant: Option<bool>,
    #[serde(default)]
    pub todos: Option<Vec<Task>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentMessage {
    Human {
        #[serde(default)]
        content: Value,
    },
    Ai {
        #[serde(default)]
        content: Value,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        content: Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub function: Option<FunctionCall>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    #[serde(default)]
    pub arguments: String,
}

fn text_of(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Log a response, update the task list from it, publish and return its result.
pub fn process_response<H>(resp: RunResponse, host: &mut H) -> FinalResult
where
    H: LogSink + TaskListProvider + ResultSink,
{
    let result = match resp.data {
        RunData::Messages { messages } => process_messages(messages, host),
        RunData::Flat(flat) => process_flat(flat, host),
    };
    host.publish(result.clone());
    result
}

fn process_messages<H>(messages: Vec<AgentMessage>, host: &mut H) -> FinalResult
where
    H: LogSink + TaskListProvider,
{
    let mut final_message: Option<String> = None;

    for message in messages {
        match message {
            AgentMessage::Human { content } => {
                host.log(LogLevel::Info, &format!("User: {}", text_of(&content)));
            }
            AgentMessage::Ai {
                content,
                tool_calls,
            } if !tool_calls.is_empty() => {
                let text = text_of(&content);
                let text = if text.is_empty() {
                    "Calling tools...".to_string()
                } else {
                    text
                };
                host.log(LogLevel::Info, &format!("Main agent: {text}"));
                for function in tool_calls.into_iter().filter_map(|c| c.function) {
                    let args = match serde_json::from_str::<Value>(&function.arguments) {
                        Ok(args) => {
                            replace_tasks_from_args(&args, host);
                            args
                        }
                        Err(_) => Value::String(function.arguments),
                    };
                    host.log(
                        LogLevel::Info,
                        &format!("  Tool call: {} {}", function.name, args),
                    );
                }
            }
            AgentMessage::Ai { content, .. } => {
                let text = text_of(&content);
                host.log(LogLevel::Info, &format!("Main agent: {text}"));
                final_message = Some(text);
            }
            AgentMessage::Tool { name, content } => {
                host.log(
                    LogLevel::Info,
                    &format!(
                        "Tool {}: {}",
                        name.as_deref().unwrap_or("unknown"),
                        text_of(&content)
                    ),
                );
            }
            AgentMessage::Other => {}
        }
    }

    let content = final_message.unwrap_or_else(|| COMPLETED_FALLBACK.to_string());
    host.log(LogLevel::Info, "=== reflect phase ===");
    host.log(LogLevel::Info, &format!("Result: {content}"));
    host.log(LogLevel::Success, "\n=== Goal completed ===");

    FinalResult {
        phase: "reflect".into(),
        result: normalize_result(&extract_structured_result(&content)),
        is_completed: true,
        tasks: host.current_tasks(),
    }
}

fn replace_tasks_from_args<H: TaskListProvider>(args: &Value, host: &mut H) {
    let Some(todos) = args.get("todos") else {
        return;
    };
    match serde_json::from_value::<Vec<Task>>(todos.clone()) {
        Ok(tasks) => host.replace_tasks(tasks),
        Err(e) => tracing::warn!(error = %e, "tool call carried an unreadable todo list"),
    }
}

fn process_flat<H>(flat: FlatResult, host: &mut H) -> FinalResult
where
    H: LogSink + TaskListProvider,
{
    let completed = flat.is_completed.unwrap_or(false);
    host.log(LogLevel::Info, &format!("=== {} phase ===", flat.phase));
    host.log(LogLevel::Info, &format!("Result: {}", flat.result));
    if completed {
        host.log(LogLevel::Success, "\n=== Goal completed ===");
    } else {
        host.log(LogLevel::Info, "\n=== Goal in progress ===");
    }

    if let Some(todos) = flat.todos.filter(|t| !t.is_empty()) {
        host.replace_tasks(todos);
        host.log(LogLevel::Info, "\n=== Todo list ===");
        for t in host.current_tasks() {
            host.log(
                LogLevel::Status(t.status.clone()),
                &format!("  {} ({})", t.description, t.status.label()),
            );
        }
    }

    FinalResult {
        phase: flat.phase,
        result: normalize_result(&extract_structured_result(&flat.result)),
        is_completed: completed,
        tasks: host.current_tasks(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::model::TaskStatus;
    use serde_json::json;

    fn parse(v: Value) -> RunResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn message_list_is_logged_and_final_ai_message_extracted() {
        let resp = parse(json!({
            "success": true,
            "data": {"messages": [
                {"type": "human", "content": "日本的首相是谁"},
                {"type": "ai", "content": "", "tool_calls": [
                    {"id": "c1", "function": {"name": "write_todos",
                        "arguments": "{\"todos\":[{\"content\":\"搜索日本首相\",\"status\":\"in_progress\"}]}"}}
                ]},
                {"type": "tool", "name": "write_todos", "content": "Updated todo list"},
                {"type": "ai", "content": "Returning structured response: phase='reflect' result='石破茂\\n(2024)' is_completed=True"},
                {"type": "system", "content": "ignored"}
            ]}
        }));
        let mut host = MemoryHost::default();
        let result = process_response(resp, &mut host);

        assert_eq!(result.result, "石破茂\n(2024)");
        assert_eq!(result.phase, "reflect");
        assert!(result.is_completed);
        assert_eq!(result.tasks.len(), 1);
        assert_eq!(result.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(host.results, vec![result]);

        let info = host.logged(&LogLevel::Info);
        assert_eq!(info[0], "User: 日本的首相是谁");
        assert_eq!(info[1], "Main agent: Calling tools...");
        assert!(info[2].starts_with("  Tool call: write_todos {"));
        assert_eq!(info[3], "Tool write_todos: Updated todo list");
        assert_eq!(host.logged(&LogLevel::Success), vec!["\n=== Goal completed ==="]);
    }

    #[test]
    fn unparseable_tool_arguments_are_logged_raw() {
        let resp = parse(json!({"data": {"messages": [
            {"type": "ai", "content": "go", "tool_calls": [
                {"function": {"name": "search", "arguments": "not json"}}
            ]}
        ]}}));
        let mut host = MemoryHost::with_tasks(vec![Task::new(0, "keep")]);
        let result = process_response(resp, &mut host);
        assert!(host
            .logged(&LogLevel::Info)
            .contains(&"  Tool call: search \"not json\""));
        assert_eq!(result.result, COMPLETED_FALLBACK);
        assert_eq!(result.tasks[0].description, "keep");
    }

    #[test]
    fn flat_result_lists_tasks_with_status_levels() {
        let resp = parse(json!({"success": true, "data": {
            "phase": "execute",
            "result": "still working",
            "is_completed": false,
            "todos": [
                {"content": "搜索资料", "status": "success"},
                {"content": "写报告", "status": "pending"}
            ]
        }}));
        let mut host = MemoryHost::default();
        let result = process_response(resp, &mut host);

        assert_eq!(result.phase, "execute");
        assert!(!result.is_completed);
        assert_eq!(result.result, "still working");
        assert_eq!(result.tasks[1].index, 1);
        assert_eq!(
            host.logged(&LogLevel::Status(TaskStatus::Success)),
            vec!["  搜索资料 (success)"]
        );
        assert!(host.logged(&LogLevel::Info).contains(&"\n=== Goal in progress ==="));
    }

    #[test]
    fn flat_result_passes_through_extractor() {
        let resp = parse(json!({"data": {
            "phase": "reflect",
            "result": "Returning structured response: result='ok' is_completed=True",
            "is_completed": true
        }}));
        let mut host = MemoryHost::default();
        let result = process_response(resp, &mut host);
        assert_eq!(result.result, "ok");
        assert!(result.tasks.is_empty());
    }
}
