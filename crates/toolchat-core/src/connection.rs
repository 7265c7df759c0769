//! Tool execution connection
//!
//! Owns the link to one tool server: starts it, performs the MCP handshake,
//! discovers its tools once, and invokes them by name. Every invocation comes
//! back as a [`ToolResult`]; tool and transport failures are data here, never
//! errors.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use toolchat_mcp::{ClientInfo, McpClient, McpError, McpTool, ServerInfo, StdioTransport, ToolCallResult, Transport};

use crate::config::LauncherConfig;
use crate::error::{ConnectionError, ToolError};
use crate::target::TargetRef;
use crate::turn::ToolResult;

/// Time allowed for the handshake and tool discovery
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Declared shape of one tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// JSON schema type, when the tool declares a single one
    pub param_type: Option<String>,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A tool the connected server offers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, ParameterSpec>,
    /// Raw JSON schema, forwarded to the model provider as-is
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn from_mcp(tool: &McpTool) -> Self {
        let required: Vec<&str> = tool.input_schema["required"]
            .as_array()
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let parameters = tool.input_schema["properties"]
            .as_object()
            .map(|props| {
                props
                    .iter()
                    .map(|(name, schema)| {
                        let spec = ParameterSpec {
                            param_type: schema["type"].as_str().map(String::from),
                            required: required.contains(&name.as_str()),
                            description: schema["description"].as_str().map(String::from),
                        };
                        (name.clone(), spec)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let input_schema = if tool.input_schema.is_object() {
            tool.input_schema.clone()
        } else {
            serde_json::json!({ "type": "object", "properties": {} })
        };

        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters,
            input_schema,
        }
    }

    /// Check arguments against the declared parameters
    ///
    /// Only required presence and scalar types are checked; nested schemas are
    /// left to the tool.
    pub fn validate(&self, arguments: &Value) -> Result<(), ToolError> {
        let args = match arguments {
            Value::Object(map) => map,
            Value::Null if !self.parameters.values().any(|p| p.required) => return Ok(()),
            other => {
                return Err(ToolError::InvalidArguments(format!(
                    "expected an object, got {}",
                    json_type_name(other)
                )));
            }
        };

        for (name, spec) in &self.parameters {
            match args.get(name) {
                None | Some(Value::Null) if spec.required => {
                    return Err(ToolError::InvalidArguments(format!(
                        "missing required argument '{}'",
                        name
                    )));
                }
                Some(value) if !value.is_null() => {
                    if let Some(expected) = &spec.param_type {
                        if !matches_type(expected, value) {
                            return Err(ToolError::InvalidArguments(format!(
                                "argument '{}' should be {}, got {}",
                                name,
                                expected,
                                json_type_name(value)
                            )));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.as_i64().is_some()
            || value.as_u64().is_some()
            || value.as_f64().is_some_and(|f| f.fract() == 0.0),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Live connection to one tool server
pub struct ToolConnection {
    client: McpClient<Box<dyn Transport>>,
    label: String,
    server_info: ServerInfo,
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    closed: bool,
}

impl std::fmt::Debug for ToolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolConnection")
            .field("label", &self.label)
            .field("server", &self.server_info.name)
            .field("tools", &self.tools.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl ToolConnection {
    /// Start the target's tool server and connect to it
    pub async fn connect(target: &TargetRef, launcher: &LauncherConfig) -> Result<Self, ConnectionError> {
        let (command, args) = target.resolve(launcher)?;
        info!(target_ref = %target, command = %command, "Starting tool server");

        let transport = StdioTransport::spawn_with(&command, &args, &launcher.env, None)
            .await
            .map_err(|source| ConnectionError::Spawn {
                target: target.to_string(),
                source,
            })?;

        Self::with_transport(target.label(), Box::new(transport)).await
    }

    /// Connect over an already established transport
    pub async fn with_transport(label: impl Into<String>, transport: Box<dyn Transport>) -> Result<Self, ConnectionError> {
        let label = label.into();
        let mut client = McpClient::new(transport);

        let handshake = async {
            let info = client
                .initialize(ClientInfo {
                    name: "toolchat".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                })
                .await
                .map_err(|e| ConnectionError::Handshake {
                    target: label.clone(),
                    reason: e.to_string(),
                })?;

            let tools = client.list_tools().await.map_err(|e| ConnectionError::Discovery {
                target: label.clone(),
                reason: e.to_string(),
            })?;

            Ok::<_, ConnectionError>((info, tools))
        };

        let outcome = match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ConnectionError::Handshake {
                target: label.clone(),
                reason: format!("no response within {}s", HANDSHAKE_TIMEOUT.as_secs()),
            }),
        };

        let (server_info, mcp_tools) = match outcome {
            Ok(ok) => ok,
            Err(e) => {
                // Don't leave a half-started server behind
                if let Err(close_err) = client.close().await {
                    debug!(error = %close_err, "Closing after failed handshake");
                }
                return Err(e);
            }
        };

        let mut tools = Vec::with_capacity(mcp_tools.len());
        let mut index = HashMap::new();
        for tool in &mcp_tools {
            if index.contains_key(&tool.name) {
                warn!(tool = %tool.name, server = %label, "Duplicate tool name, keeping the first");
                continue;
            }
            index.insert(tool.name.clone(), tools.len());
            tools.push(ToolDescriptor::from_mcp(tool));
        }

        info!(
            server = %server_info.name,
            version = %server_info.version,
            tool_count = tools.len(),
            "Connected to tool server"
        );

        Ok(Self {
            client,
            label,
            server_info,
            tools,
            index,
            closed: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Tools discovered at connect time, in server order
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Invoke a tool by name
    ///
    /// Unknown names and arguments that don't fit the declared parameters are
    /// answered locally without contacting the server. Tool-side failures come
    /// back as `Ok(ToolResult::Failure)`; losing the server itself is an error
    /// and leaves the connection closed.
    pub async fn invoke(&mut self, name: &str, arguments: &Value) -> Result<ToolResult, ConnectionError> {
        let Some(descriptor) = self.descriptor(name) else {
            return Ok(ToolError::UnknownTool(name.to_string()).into());
        };
        if let Err(e) = descriptor.validate(arguments) {
            debug!(tool = name, error = %e, "Rejected tool arguments");
            return Ok(e.into());
        }
        if self.closed {
            return Err(self.lost("connection is closed".to_string()));
        }

        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments.clone()
        };

        debug!(tool = name, "Invoking tool");
        match self.client.call_tool(name, arguments).await {
            Ok(result) => Ok(interpret_call_result(name, &result)),
            Err(McpError::Transport(reason)) => {
                warn!(tool = name, server = %self.label, error = %reason, "Tool server went away");
                self.close().await;
                Err(self.lost(reason))
            }
            Err(e) => {
                warn!(tool = name, error = %e, "Tool call failed");
                Ok(ToolError::Execution(format!("tool '{}' failed: {}", name, e)).into())
            }
        }
    }

    fn lost(&self, reason: String) -> ConnectionError {
        ConnectionError::Lost {
            target: self.label.clone(),
            reason,
        }
    }

    /// Shut the server down; only the first call does anything
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        if let Err(e) = self.client.close().await {
            warn!(server = %self.label, error = %e, "Error closing tool server");
        }
        info!(server = %self.label, "Tool server connection closed");
        true
    }
}

/// Turn a `tools/call` result into a [`ToolResult`]
///
/// Tools report their own failures either with `isError` or by returning an
/// object with an `error` field (and optionally a `suggestion`).
fn interpret_call_result(name: &str, result: &ToolCallResult) -> ToolResult {
    let text = result.text();

    if result.is_error {
        let message = if text.trim().is_empty() {
            format!("tool '{}' reported an error", name)
        } else {
            text
        };
        return ToolResult::failure(message);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(obj)) if obj.contains_key("error") => {
            let message = match &obj["error"] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let failure = ToolResult::failure(message);
            match obj.get("suggestion").and_then(|s| s.as_str()) {
                Some(suggestion) => failure.with_suggestion(suggestion),
                None => failure,
            }
        }
        Ok(value) => ToolResult::success(value),
        Err(_) => ToolResult::success(Value::String(text)),
    }
}
