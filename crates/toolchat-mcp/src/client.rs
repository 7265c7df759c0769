//! MCP Client implementation

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::protocol::{methods, IncomingMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::transport::Transport;
use crate::{McpTool, ServerCapabilities, PROTOCOL_VERSION};

/// Upper bound on `tools/list` pages, guards against servers that never stop paginating
const MAX_TOOL_PAGES: usize = 64;

/// MCP Client for connecting to MCP servers
pub struct McpClient<T: Transport> {
    transport: Arc<Mutex<T>>,
    request_id: AtomicI64,
    server_capabilities: Option<ServerCapabilities>,
}

impl<T: Transport> McpClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(Mutex::new(transport)),
            request_id: AtomicI64::new(1),
            server_capabilities: None,
        }
    }

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn server_capabilities(&self) -> Option<&ServerCapabilities> {
        self.server_capabilities.as_ref()
    }

    /// Initialize the connection
    pub async fn initialize(&mut self, client_info: ClientInfo) -> Result<ServerInfo, McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": client_info.name,
                "version": client_info.version
            }
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::INITIALIZE).with_params(params);

        let result = self.request(request).await?;
        let server_info: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;

        self.server_capabilities = Some(server_info.capabilities.clone());

        let notification = serde_json::to_value(JsonRpcNotification::new(methods::INITIALIZED))
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        let mut transport = self.transport.lock().await;
        transport
            .send(notification)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        Ok(ServerInfo {
            name: server_info.server_info.name,
            version: server_info.server_info.version,
            protocol_version: server_info.protocol_version,
        })
    }

    /// List available tools, following `nextCursor` pagination
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let mut request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_LIST);
            if let Some(c) = &cursor {
                request = request.with_params(serde_json::json!({ "cursor": c }));
            }

            let result = self.request(request).await?;
            let page: ToolsListResult =
                serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }

        Err(McpError::Protocol(format!(
            "tools/list did not finish after {} pages",
            MAX_TOOL_PAGES
        )))
    }

    /// Call a tool
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        let request = JsonRpcRequest::new(self.next_id(), methods::TOOLS_CALL).with_params(params);

        let result = self.request(request).await?;
        serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))
    }

    /// Close the underlying transport
    pub async fn close(&self) -> Result<(), McpError> {
        let mut transport = self.transport.lock().await;
        transport
            .close()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    /// Send a request and unwrap its `result`, mapping JSON-RPC errors to [`McpError::Server`]
    async fn request(&self, request: JsonRpcRequest) -> Result<Value, McpError> {
        let response = self.send_request(request).await?;

        if let Some(error) = response.error {
            Err(McpError::Server {
                code: error.code,
                message: error.message,
            })
        } else if let Some(result) = response.result {
            Ok(result)
        } else {
            Err(McpError::Protocol("Empty response".to_string()))
        }
    }

    async fn send_request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        let mut transport = self.transport.lock().await;

        let expected_id = request.id.clone();
        let request_value =
            serde_json::to_value(&request).map_err(|e| McpError::Protocol(e.to_string()))?;

        trace!(method = %request.method, id = %expected_id, "Sending request");
        transport
            .send(request_value)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        // Skip notifications and server-initiated requests until our response shows up
        loop {
            let value = transport
                .receive()
                .await
                .map_err(|e| McpError::Transport(e.to_string()))?
                .ok_or_else(|| McpError::Transport("Connection closed".to_string()))?;

            match IncomingMessage::classify(value) {
                Some(IncomingMessage::Response(response)) => {
                    let is_ours = match &response.id {
                        Some(id) => *id == expected_id,
                        // A null id means the server could not parse what we sent
                        None => response.error.is_some(),
                    };
                    if is_ours {
                        return Ok(response);
                    }
                    debug!(id = ?response.id, expected = %expected_id, "Ignoring response with mismatched id");
                }
                Some(IncomingMessage::Notification(n)) => {
                    debug!(method = %n.method, "Ignoring server notification");
                }
                Some(IncomingMessage::Request(r)) => {
                    debug!(method = %r.method, "Ignoring server request");
                }
                None => return Err(McpError::Protocol("Malformed message from server".to_string())),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

#[derive(Debug, serde::Deserialize)]
struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    protocol_version: String,
    #[serde(default)]
    capabilities: ServerCapabilities,
    #[serde(rename = "serverInfo")]
    server_info: ServerInfoInner,
}

#[derive(Debug, serde::Deserialize)]
struct ServerInfoInner {
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, serde::Deserialize)]
struct ToolsListResult {
    tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ToolCallResult {
    /// All text content items joined with newlines
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|item| item.content_type == "text")
            .filter_map(|item| item.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// MCP errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Server error ({code}): {message}")]
    Server { code: i64, message: String },
}
