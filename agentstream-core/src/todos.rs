//! Todo-list update announcements embedded in token content, e.g.
//! `Updated todo list to [{'content': '搜索资料', 'status': 'in_progress'}]`.

use crate::boundary::matching_close;
use crate::model::Task;

pub const TODO_UPDATE_MARKER: &str = "Updated todo list to ";

pub fn announces_update(content: &str) -> bool {
    content.contains(TODO_UPDATE_MARKER)
}

/// Parse the list that follows the update marker. Accepts JSON and the
/// agent's Python-literal rendering. `None` when no list can be recovered.
pub fn parse_todo_update(content: &str) -> Option<Vec<Task>> {
    let after = &content[content.find(TODO_UPDATE_MARKER)? + TODO_UPDATE_MARKER.len()..];
    let open = after.find('[')?;
    let close = matching_close(after, open, b'[', b']')?;
    let list = &after[open..close];

    let tasks = serde_json::from_str::<Vec<Task>>(list)
        .or_else(|_| serde_json::from_str::<Vec<Task>>(&python_literal_to_json(list)))
        .ok()?;
    Some(Task::reindex(tasks))
}

/// Rewrite Python literal syntax (single-quoted strings, `True`/`False`/`None`)
/// as JSON.
fn python_literal_to_json(src: &str) -> String {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some('\'') => out.push('\''),
                            Some(n) => {
                                out.push('\\');
                                out.push(n);
                            }
                            None => {}
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        _ => out.push(c),
                    }
                }
                out.push('"');
            }
            '"' => {
                out.push('"');
                while let Some(c) = chars.next() {
                    out.push(c);
                    if c == '\\' {
                        if let Some(n) = chars.next() {
                            out.push(n);
                        }
                    } else if c == '"' {
                        break;
                    }
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if !n.is_ascii_alphanumeric() && n != '_' {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                out.push_str(match word.as_str() {
                    "True" => "true",
                    "False" => "false",
                    "None" => "null",
                    other => other,
                });
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;

    #[test]
    fn parses_python_rendered_list() {
        let content = "Updated todo list to [{'content': '搜索日本首相', 'status': 'in_progress'}, {'content': \"总结 O'Neil 的观点\", 'status': 'pending'}]";
        let tasks = parse_todo_update(content).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].description, "搜索日本首相");
        assert_eq!(tasks[0].status, TaskStatus::InProgress);
        assert_eq!(tasks[1].index, 1);
        assert_eq!(tasks[1].description, "总结 O'Neil 的观点");
    }

    #[test]
    fn parses_json_list() {
        let content = r#"ok. Updated todo list to [{"content":"写报告","status":"completed"}] done"#;
        let tasks = parse_todo_update(content).unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Completed);
    }

    #[test]
    fn python_keywords_and_escaped_quotes() {
        let json = python_literal_to_json(r#"[{'a': True, 'b': None, 'c': 'it\'s "x"'}]"#);
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v[0]["a"], true);
        assert!(v[0]["b"].is_null());
        assert_eq!(v[0]["c"], "it's \"x\"");
    }

    #[test]
    fn missing_or_broken_list_yields_none() {
        assert!(parse_todo_update("no marker [1]").is_none());
        assert!(parse_todo_update("Updated todo list to nothing").is_none());
        assert!(parse_todo_update("Updated todo list to [{'content': ").is_none());
        assert!(parse_todo_update("Updated todo list to [42]").is_none());
        assert!(announces_update("x Updated todo list to []"));
    }
}
