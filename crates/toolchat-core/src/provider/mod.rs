//! Model provider seam
//!
//! The orchestration loop talks to language models only through
//! [`ModelProvider`]. [`GenAIProvider`] is the production implementation,
//! backed by the genai framework; supported providers include:
//! - Google Gemini (default)
//! - Anthropic
//! - OpenAI
//! - Groq
//! - DeepSeek
//! - xAI
//! - Ollama (local)

pub mod catalog;
mod genai_provider;
mod logging;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use catalog::ProviderType;
pub use genai_provider::{GenAIProvider, create_provider};
pub use logging::{LogConfig, log_llm_interaction};

use crate::connection::ToolDescriptor;
use crate::error::Result;
use crate::turn::{ConversationTurn, ToolCallRequest};

/// What the model produced for one round
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Text content from the assistant (may be present even with tool calls)
    pub text: Option<String>,
    /// Tool calls requested this round, in model order
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self { text: None, tool_calls }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Text content, when non-empty
    pub fn content(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// A language model that can answer or request tool calls
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "gemini", "anthropic")
    fn name(&self) -> &str;

    /// Generate the next response for the conversation so far
    async fn generate(&self, turns: &[ConversationTurn], tools: &[ToolDescriptor]) -> Result<ModelResponse>;
}
