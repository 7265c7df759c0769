//! JSON-RPC 2.0 message types used by MCP

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP method names
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// Request identifier (numbers on our side, servers may echo strings)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: None,
        }
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// A message without an id; no response is expected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// `null` when the server could not read the request id
    #[serde(default)]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(-32600, "Invalid request")
    }

    pub fn method_not_found() -> Self {
        Self::new(-32601, "Method not found")
    }

    pub fn invalid_params() -> Self {
        Self::new(-32602, "Invalid params")
    }

    pub fn internal_error() -> Self {
        Self::new(-32603, "Internal error")
    }
}

/// Classification of a raw message read from a transport
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Response(JsonRpcResponse),
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl IncomingMessage {
    /// Sort a raw JSON value into response / request / notification.
    ///
    /// Returns `None` for values that are none of the three.
    pub fn classify(value: Value) -> Option<Self> {
        let obj = value.as_object()?;
        let has_id = obj.get("id").is_some_and(|id| !id.is_null());
        let has_method = obj.contains_key("method");
        let is_response = obj.contains_key("result") || obj.contains_key("error");

        if is_response && !has_method {
            serde_json::from_value(value).ok().map(Self::Response)
        } else if has_method && has_id {
            serde_json::from_value(value).ok().map(Self::Request)
        } else if has_method {
            serde_json::from_value(value).ok().map(Self::Notification)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization_omits_missing_params() {
        let req = JsonRpcRequest::new(RequestId::Number(7), methods::TOOLS_LIST);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/list"}));
    }

    #[test]
    fn test_classify_response() {
        let msg = IncomingMessage::classify(json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
        assert!(matches!(msg, Some(IncomingMessage::Response(r)) if r.id == Some(RequestId::Number(1))));
    }

    #[test]
    fn test_classify_notification() {
        let msg = IncomingMessage::classify(json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {"level": "info"}
        }));
        assert!(matches!(msg, Some(IncomingMessage::Notification(_))));
    }

    #[test]
    fn test_classify_request_with_string_id() {
        let msg = IncomingMessage::classify(json!({"jsonrpc": "2.0", "id": "abc", "method": "ping"}));
        assert!(matches!(msg, Some(IncomingMessage::Request(r)) if r.id == RequestId::String("abc".into())));
    }

    #[test]
    fn test_classify_garbage() {
        assert!(IncomingMessage::classify(json!([1, 2, 3])).is_none());
        assert!(IncomingMessage::classify(json!({"hello": "world"})).is_none());
    }

    #[test]
    fn test_error_response_roundtrip() {
        let resp = JsonRpcResponse::error(RequestId::Number(3), JsonRpcError::method_not_found());
        let text = serde_json::to_string(&resp).unwrap();
        let parsed: JsonRpcResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.error.unwrap().code, -32601);
        assert!(parsed.result.is_none());
    }
}
