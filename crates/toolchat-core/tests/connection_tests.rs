//! Tool execution connection tests
//!
//! Handshake, discovery, invocation and shutdown against an in-process tool
//! server, plus failure to reach a server at all.

mod common;

use std::io;

use async_trait::async_trait;
use serde_json::{Value, json};

use common::{DemoTools, demo_connection, dying_demo_connection};
use toolchat_core::config::LauncherConfig;
use toolchat_core::connection::ToolConnection;
use toolchat_core::error::ConnectionError;
use toolchat_core::target::TargetRef;
use toolchat_core::turn::ToolResult;
use toolchat_mcp::Transport;

/// Transport whose peer hangs up immediately
struct DeadTransport;

#[async_trait]
impl Transport for DeadTransport {
    async fn send(&mut self, _message: Value) -> io::Result<()> {
        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        Ok(None)
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

mod discovery_tests {
    use super::*;

    #[tokio::test]
    async fn test_descriptors_discovered_once() {
        let (connection, _) = demo_connection(DemoTools::with_search_key()).await;

        let names: Vec<&str> = connection.tool_names();
        assert_eq!(names, vec!["websearch", "calculate", "system_info"]);
        assert!(connection.has_tool("calculate"));
        assert!(!connection.has_tool("teleport"));

        let search = connection.descriptor("websearch").unwrap();
        assert!(search.parameters["query"].required);
        assert_eq!(search.parameters["num_results"].param_type.as_deref(), Some("integer"));
        assert_eq!(connection.server_info().name, "toolchat-mcp");
    }

    #[tokio::test]
    async fn test_dead_peer_is_handshake_error() {
        let result = ToolConnection::with_transport("dead", Box::new(DeadTransport)).await;
        match result {
            Err(ConnectionError::Handshake { target, .. }) => assert_eq!(target, "dead"),
            other => panic!("expected handshake error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_missing_server_is_spawn_error() {
        let target = TargetRef::path("toolchat-no-such-server-binary");
        let result = ToolConnection::connect(&target, &LauncherConfig::default()).await;
        assert!(matches!(result, Err(ConnectionError::Spawn { .. })));
    }
}

mod invoke_tests {
    use super::*;

    #[tokio::test]
    async fn test_invoke_success() {
        let (mut connection, counters) = demo_connection(DemoTools::with_search_key()).await;

        let result = connection.invoke("calculate", &json!({"expression": "2+2"})).await.unwrap();
        assert_eq!(result, ToolResult::success(json!({"result": 4.0})));
        assert_eq!(counters.tool_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_never_reaches_transport() {
        let (mut connection, counters) = demo_connection(DemoTools::with_search_key()).await;

        let result = connection.invoke("unknownTool", &json!({})).await.unwrap();
        assert_eq!(result.error_message(), Some("unknown tool: unknownTool"));
        assert_eq!(counters.tool_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_arguments_never_reach_transport() {
        let (mut connection, counters) = demo_connection(DemoTools::with_search_key()).await;

        let missing = connection.invoke("websearch", &json!({})).await.unwrap();
        assert_eq!(
            missing.error_message(),
            Some("invalid arguments: missing required argument 'query'")
        );

        let wrong_type = connection.invoke("websearch", &json!({"query": 42})).await.unwrap();
        assert!(wrong_type.error_message().unwrap().starts_with("invalid arguments:"));

        let not_object = connection.invoke("calculate", &json!("2+2")).await.unwrap();
        assert!(!not_object.is_ok());

        assert_eq!(counters.tool_calls(), 0);
    }

    #[tokio::test]
    async fn test_error_payload_becomes_failure_with_suggestion() {
        let (mut connection, _) = demo_connection(DemoTools::without_search_key()).await;

        let result = connection.invoke("websearch", &json!({"query": "rust"})).await.unwrap();
        assert_eq!(
            result,
            ToolResult::Failure {
                message: "missing API key".to_string(),
                suggestion: Some("Set SERPAPI_KEY in the tool server environment".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_tool_side_error_becomes_failure() {
        let (mut connection, counters) = demo_connection(DemoTools::with_search_key()).await;

        let result = connection.invoke("calculate", &json!({"expression": "two plus two"})).await.unwrap();
        assert_eq!(result.error_message(), Some("cannot evaluate 'two plus two'"));
        assert_eq!(counters.tool_calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_without_arguments() {
        let (mut connection, _) = demo_connection(DemoTools::with_search_key()).await;

        let result = connection.invoke("system_info", &Value::Null).await.unwrap();
        assert_eq!(result, ToolResult::success(json!({"os": "testos", "cpus": 4})));
    }
}

mod close_tests {
    use super::*;

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (mut connection, counters) = demo_connection(DemoTools::with_search_key()).await;

        assert!(connection.close().await);
        assert!(!connection.close().await);
        assert!(connection.is_closed());
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_invoke_after_close_fails_without_transport() {
        let (mut connection, counters) = demo_connection(DemoTools::with_search_key()).await;
        connection.close().await;

        let result = connection.invoke("calculate", &json!({"expression": "1+1"})).await;
        assert!(matches!(result, Err(ConnectionError::Lost { .. })));
        assert_eq!(counters.tool_calls(), 0);
    }
}

mod lost_server_tests {
    use super::*;

    #[tokio::test]
    async fn test_server_dying_mid_call_is_connection_loss() {
        let (mut connection, counters) = dying_demo_connection(DemoTools::with_search_key()).await;

        let result = connection.invoke("websearch", &json!({"query": "rust"})).await;
        match result {
            Err(ConnectionError::Lost { target, reason }) => {
                assert_eq!(target, "demo");
                assert!(reason.contains("Connection closed"));
            }
            other => panic!("expected lost connection, got {:?}", other),
        }

        assert!(connection.is_closed());
        assert_eq!(counters.closes(), 1);
        // Already shut down, nothing left to close
        assert!(!connection.close().await);
        assert_eq!(counters.closes(), 1);
    }

    #[tokio::test]
    async fn test_local_rejections_survive_a_dead_server() {
        let (mut connection, counters) = dying_demo_connection(DemoTools::with_search_key()).await;

        let unknown = connection.invoke("teleport", &json!({})).await.unwrap();
        assert_eq!(unknown.error_message(), Some("unknown tool: teleport"));
        assert!(!connection.is_closed());
        assert_eq!(counters.tool_calls(), 0);
    }
}
