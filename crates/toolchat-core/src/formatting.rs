//! Formatting utilities for tool calls and results
//!
//! Renders tool results into the text the model reads and tool calls into
//! the one-line summaries shown to the user.

use serde_json::Value;

use crate::turn::ToolResult;

// ============================================================================
// Truncation utilities
// ============================================================================

/// Truncate a string to `max` characters, adding "..." if truncated
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", keep)
}

/// Byte offset of the last char boundary at or below `max` bytes
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    cut
}

/// Truncate a tool result to prevent context overflow
///
/// JSON arrays and objects are cut at element boundaries so what the model
/// sees stays valid JSON; everything else is cut at a line boundary when one
/// is close enough.
pub fn truncate_tool_result(result: &str, max_size: usize) -> String {
    if result.len() <= max_size {
        return result.to_string();
    }

    let trimmed = result.trim();
    if (trimmed.starts_with('{') && trimmed.ends_with('}')) || (trimmed.starts_with('[') && trimmed.ends_with(']')) {
        if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
            if let Some(truncated) = truncate_json_value(&json, max_size) {
                return truncated;
            }
        }
    }

    truncate_at_line_boundary(result, max_size)
}

fn truncate_json_value(value: &Value, max_size: usize) -> Option<String> {
    match value {
        Value::Array(arr) => {
            let mut kept = Vec::new();
            let mut size = 2;
            for item in arr {
                let item_size = serde_json::to_string(item).map(|s| s.len()).unwrap_or(0) + 2;
                if size + item_size > max_size {
                    break;
                }
                kept.push(item.clone());
                size += item_size;
            }
            let shown = kept.len();
            if shown == 0 {
                return None;
            }
            let json = serde_json::to_string(&Value::Array(kept)).ok()?;
            Some(format!(
                "{}\n\n[Array truncated - showing {} of {} items]",
                json,
                shown,
                arr.len()
            ))
        }
        Value::Object(obj) => {
            let mut kept = serde_json::Map::new();
            let mut size = 2;
            for (key, val) in obj {
                let pair_size = key.len() + serde_json::to_string(val).map(|s| s.len()).unwrap_or(0) + 6;
                if size + pair_size > max_size {
                    break;
                }
                kept.insert(key.clone(), val.clone());
                size += pair_size;
            }
            let shown = kept.len();
            if shown == 0 {
                return None;
            }
            let json = serde_json::to_string(&Value::Object(kept)).ok()?;
            Some(format!(
                "{}\n\n[Object truncated - showing {} of {} keys]",
                json,
                shown,
                obj.len()
            ))
        }
        _ => None,
    }
}

fn truncate_at_line_boundary(result: &str, max_size: usize) -> String {
    let cut = floor_char_boundary(result, max_size);
    let cut = match result[..cut].rfind('\n') {
        Some(newline) if newline > max_size / 2 => newline,
        _ => cut,
    };

    format!(
        "{}\n\n[Result truncated - {} chars total, showing first {}]",
        &result[..cut],
        result.len(),
        cut
    )
}

// ============================================================================
// Tool result formatting (for LLM consumption)
// ============================================================================

/// Render a tool result as the text sent back to the model
///
/// Failures are wrapped in `<tool_use_error>` so the model can tell them apart
/// from payloads that merely mention errors.
pub fn format_tool_result_for_model(result: &ToolResult) -> String {
    match result {
        ToolResult::Success { payload } => match payload {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        },
        ToolResult::Failure { message, suggestion } => match suggestion {
            Some(suggestion) => format!(
                "<tool_use_error>{}\nSuggestion: {}</tool_use_error>",
                message, suggestion
            ),
            None => format!("<tool_use_error>{}</tool_use_error>", message),
        },
    }
}

/// Apply the size budget to a tool result before it joins the transcript
pub fn truncate_result(result: ToolResult, max_size: usize) -> ToolResult {
    match result {
        ToolResult::Success { payload: Value::String(s) } if s.len() > max_size => {
            ToolResult::success(Value::String(truncate_tool_result(&s, max_size)))
        }
        ToolResult::Success { payload } => {
            let rendered = serde_json::to_string(&payload).unwrap_or_default();
            if rendered.len() > max_size {
                ToolResult::success(Value::String(truncate_tool_result(&rendered, max_size)))
            } else {
                ToolResult::Success { payload }
            }
        }
        ToolResult::Failure { message, suggestion } if message.len() > max_size => ToolResult::Failure {
            message: truncate_at_line_boundary(&message, max_size),
            suggestion,
        },
        failure => failure,
    }
}

// ============================================================================
// Tool call formatting (for display)
// ============================================================================

/// Format a tool call as `name(param: value, ...)`
pub fn format_tool_call(tool_name: &str, args: &Value) -> String {
    let Some(obj) = args.as_object() else {
        return format!("{}(...)", tool_name);
    };

    let params: Vec<String> = obj
        .iter()
        .take(2)
        .map(|(k, v)| {
            let val = match v {
                Value::String(s) => format!("\"{}\"", truncate_str(s, 30)),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null => "null".to_string(),
                _ => "...".to_string(),
            };
            format!("{}: {}", k, val)
        })
        .collect();

    if obj.len() > 2 {
        format!("{}({}, ...)", tool_name, params.join(", "))
    } else {
        format!("{}({})", tool_name, params.join(", "))
    }
}

/// One-line summary of a tool result for display
pub fn format_result_summary(result: &ToolResult) -> String {
    match result {
        ToolResult::Success { payload } => {
            let text = match payload {
                Value::String(s) => s.clone(),
                other => serde_json::to_string(other).unwrap_or_default(),
            };
            let first_line = text.lines().next().unwrap_or("");
            truncate_str(first_line, 80)
        }
        ToolResult::Failure { message, .. } => format!("Error: {}", truncate_str(message, 80)),
    }
}
