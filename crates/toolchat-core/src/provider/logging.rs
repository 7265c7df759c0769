//! LLM request/response logging utilities
//!
//! Set the `LLM_LOG_FILE` environment variable to append one JSON line per
//! model interaction to that file.
//!
//! Example: `LLM_LOG_FILE=/tmp/llm.log toolchat run server.py "hello"`

use std::io::Write;
use std::path::Path;

use serde_json::{Value, json};
use tracing::{debug, warn};

use super::ModelResponse;
use crate::connection::ToolDescriptor;
use crate::turn::ConversationTurn;

/// Everything recorded about one interaction
#[derive(Default)]
pub struct LogConfig<'a> {
    pub model: &'a str,
    /// Provider name (e.g., "gemini")
    pub provider: Option<&'a str>,
    pub system_prompt: Option<&'a str>,
    pub turns: &'a [ConversationTurn],
    pub tools: Option<&'a [ToolDescriptor]>,
    pub result: Option<&'a ModelResponse>,
    pub error: Option<&'a str>,
}

fn build_entry(config: &LogConfig<'_>) -> Value {
    json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "model": config.model,
        "provider": config.provider,
        "request": {
            "system_prompt": config.system_prompt,
            "turns": config.turns,
            "turn_count": config.turns.len(),
            "tools": config.tools.map(|t| t.iter().map(|tool| json!({
                "name": tool.name,
                "description": tool.description,
                "schema": tool.input_schema
            })).collect::<Vec<_>>()),
            "tool_count": config.tools.map(|t| t.len()).unwrap_or(0),
        },
        "response": config.result.map(|r| json!({
            "type": if r.has_tool_calls() { "tool_calls" } else { "message" },
            "content": r.text,
            "tool_calls": r.tool_calls,
        })),
        "error": config.error,
    })
}

/// Append an entry to `path`
pub fn write_log_entry(path: &Path, config: &LogConfig<'_>) {
    let entry = build_entry(config);
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut file) => {
            if let Err(e) = writeln!(file, "{}", serde_json::to_string(&entry).unwrap_or_default()) {
                warn!("Failed to write to LLM log file: {}", e);
            }
        }
        Err(e) => {
            warn!("Failed to open LLM log file {}: {}", path.display(), e);
        }
    }
}

/// Log an LLM interaction to file if LLM_LOG_FILE is set
pub fn log_llm_interaction(config: LogConfig<'_>) {
    let Ok(log_file) = std::env::var("LLM_LOG_FILE") else {
        return;
    };
    write_log_entry(Path::new(&log_file), &config);
    debug!("Logged LLM interaction to {}", log_file);
}
