//! Conversation turns and the ordered transcript that holds them

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Who contributed a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlates the request with its result turn
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(call_id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Outcome of a tool invocation, success or failure, always as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success {
        payload: Value,
    },
    Failure {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
}

impl ToolResult {
    pub fn success(payload: impl Into<Value>) -> Self {
        Self::Success { payload: payload.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(self, suggestion: impl Into<String>) -> Self {
        match self {
            Self::Failure { message, .. } => Self::Failure {
                message,
                suggestion: Some(suggestion.into()),
            },
            ok => ok,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failure { message, .. } => Some(message),
            Self::Success { .. } => None,
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::failure(err.to_string())
    }
}

/// What a turn carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnContent {
    Text { text: String },
    ToolCall(ToolCallRequest),
    ToolResult { call_id: String, result: ToolResult },
}

/// One atomic contribution to the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
    pub position: usize,
}

impl ConversationTurn {
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            TurnContent::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self.content, TurnContent::ToolCall(_))
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self.content, TurnContent::ToolResult { .. })
    }
}

/// Ordered, append-only sequence of turns
///
/// Positions are assigned on append and are strictly increasing. Turns are
/// never edited once pushed; `clear` is the only way to drop them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
    next_position: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: TurnContent) -> usize {
        let position = self.next_position;
        self.turns.push(ConversationTurn { role, content, position });
        self.next_position += 1;
        position
    }

    pub fn push_user(&mut self, text: impl Into<String>) -> usize {
        self.push(Role::User, TurnContent::Text { text: text.into() })
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) -> usize {
        self.push(Role::Assistant, TurnContent::Text { text: text.into() })
    }

    /// Append a tool call and its result back to back
    pub fn push_tool_exchange(&mut self, call: ToolCallRequest, result: ToolResult) {
        let call_id = call.call_id.clone();
        self.push(Role::Assistant, TurnContent::ToolCall(call));
        self.push(Role::Tool, TurnContent::ToolResult { call_id, result });
    }

    /// Re-append turns from another sequence, renumbering positions
    pub fn extend_from(&mut self, turns: &[ConversationTurn]) {
        for turn in turns {
            self.push(turn.role, turn.content.clone());
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Turns appended after the first `start` entries
    pub fn since(&self, start: usize) -> &[ConversationTurn] {
        &self.turns[start.min(self.turns.len())..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Positions keep increasing after a clear, so stale positions are never reused
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
