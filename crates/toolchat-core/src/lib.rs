//! toolchat core library
//!
//! Runs multi-turn conversations in which a language model can call tools
//! hosted by a separate MCP server process:
//! - History codec: resumes a conversation from caller-held `{role, content}` records
//! - Tool execution connection: handshake, discovery and invocation over MCP
//! - Orchestration loop: bounded model/tool ping-pong with failures as data
//! - Session controller: the text-in, text-out façade used by the CLI

pub mod config;
pub mod connection;
pub mod error;
pub mod formatting;
pub mod history;
pub mod marker;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod system_prompt;
pub mod target;
pub mod turn;

pub use config::{Config, ConfigManager, LauncherConfig, LoopConfig, ProviderConfig};
pub use connection::{ParameterSpec, ToolConnection, ToolDescriptor};
pub use error::{ConnectionError, Error, Result, ToolError};
pub use history::{PlainEntry, decode, decode_json, parse_json};
pub use marker::{extract_response, format_response};
pub use orchestrator::{LoopOutcome, LoopStatus, RoundState, ToolLoop};
pub use provider::{GenAIProvider, ModelProvider, ModelResponse, ProviderType, create_provider};
pub use session::ChatSession;
pub use target::{TargetRef, discover_targets};
pub use turn::{ConversationTurn, Role, ToolCallRequest, ToolResult, Transcript, TurnContent};
