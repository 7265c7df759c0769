//! MCP Server implementation
//!
//! Request dispatcher for tools hosted in the current process. Paired with
//! [`LoopbackTransport`](crate::transport::LoopbackTransport) it behaves like
//! a tool server reached over a pipe.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::protocol::{methods, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
use crate::{McpTool, ServerCapabilities, ToolsCapability, PROTOCOL_VERSION};

/// Handler for MCP requests
#[async_trait]
pub trait McpHandler: Send + Sync {
    /// List available tools
    async fn list_tools(&self) -> Vec<McpTool>;

    /// Call a tool
    ///
    /// `Err` is reported to the client as a tool-level error (`isError: true`),
    /// not as a protocol failure.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, String>;
}

/// MCP Server
pub struct McpServer<H: McpHandler> {
    handler: Arc<H>,
    capabilities: ServerCapabilities,
    server_name: String,
    server_version: String,
}

impl<H: McpHandler> McpServer<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability { list_changed: false }),
            },
            server_name: "toolchat-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(request.id),
            methods::TOOLS_LIST => self.handle_tools_list(request.id).await,
            methods::TOOLS_CALL => self.handle_tools_call(request.id, request.params).await,
            _ => JsonRpcResponse::error(request.id, JsonRpcError::method_not_found()),
        }
    }

    fn handle_initialize(&self, id: RequestId) -> JsonRpcResponse {
        let result = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": self.capabilities,
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version
            }
        });

        JsonRpcResponse::success(id, result)
    }

    async fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let tools = self.handler.list_tools().await;
        JsonRpcResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params = match params {
            Some(p) => p,
            None => return JsonRpcResponse::error(id, JsonRpcError::invalid_params()),
        };

        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n,
            None => return JsonRpcResponse::error(id, JsonRpcError::invalid_params()),
        };

        let arguments = params
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Object(Default::default()));

        let (text, is_error) = match self.handler.call_tool(name, arguments).await {
            Ok(Value::String(s)) => (s, false),
            Ok(result) => (result.to_string(), false),
            Err(e) => (e, true),
        };

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error
            }),
        )
    }
}
