//! toolchat MCP - Model Context Protocol plumbing
//!
//! This crate provides the tool-execution side of toolchat: JSON-RPC framing,
//! transports to a tool server (child process over stdio, or in-process
//! loopback), the client used to discover and call tools, and a small server
//! dispatcher for hosting tools inside the current process.

pub mod client;
pub mod protocol;
pub mod server;
pub mod transport;

use serde::{Deserialize, Serialize};

pub use client::{ClientInfo, ContentItem, McpClient, McpError, ServerInfo, ToolCallResult};
pub use server::{McpHandler, McpServer};
pub use transport::{LoopbackTransport, StdioTransport, Transport};

/// MCP protocol version
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Tool definition in MCP format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
}

impl McpTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Server capabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(rename = "listChanged", default)]
    pub list_changed: bool,
}
