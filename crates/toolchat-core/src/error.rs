//! Error types for toolchat core

use thiserror::Error;

/// Result type alias using toolchat Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a `process_query` call early
#[derive(Error, Debug)]
pub enum Error {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Not connected to a tool server")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Failures establishing or keeping the tool execution connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid tool server target: {0}")]
    InvalidTarget(String),

    #[error("Failed to start tool server '{target}': {source}")]
    Spawn {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Handshake with '{target}' failed: {reason}")]
    Handshake { target: String, reason: String },

    #[error("Tool discovery on '{target}' failed: {reason}")]
    Discovery { target: String, reason: String },

    #[error("Lost connection to '{target}': {reason}")]
    Lost { target: String, reason: String },
}

/// Tool-level failures; always folded into a `ToolResult::Failure`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Execution(String),
}
