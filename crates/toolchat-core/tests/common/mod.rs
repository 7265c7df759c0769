//! Shared fixtures for toolchat-core integration tests
//!
//! A scripted model provider and an in-process tool server reached through
//! a transport that counts what crosses it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use toolchat_core::connection::{ToolConnection, ToolDescriptor};
use toolchat_core::error::{Error, Result};
use toolchat_core::provider::{ModelProvider, ModelResponse};
use toolchat_core::turn::{ConversationTurn, ToolCallRequest};
use toolchat_mcp::{LoopbackTransport, McpHandler, McpTool, Transport};

// ============================================================================
// Scripted model provider
// ============================================================================

/// What the provider does once its script runs out
#[derive(Clone)]
pub enum WhenExhausted {
    /// Fail with a provider error
    Fail,
    /// Keep requesting the same tool call forever
    RepeatToolCall { tool: String, arguments: Value },
    /// Never answer
    Hang,
}

pub enum Step {
    Respond(ModelResponse),
    Fail(String),
}

/// Model stand-in that replays a fixed script and records what it was shown
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    when_exhausted: WhenExhausted,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ConversationTurn>>>,
    seen_tools: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            when_exhausted: WhenExhausted::Fail,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            seen_tools: Mutex::new(Vec::new()),
        }
    }

    pub fn when_exhausted(mut self, behavior: WhenExhausted) -> Self {
        self.when_exhausted = behavior;
        self
    }

    /// Provider that always requests `tool`
    pub fn always_calling(tool: &str, arguments: Value) -> Self {
        Self::new(Vec::new()).when_exhausted(WhenExhausted::RepeatToolCall {
            tool: tool.to_string(),
            arguments,
        })
    }

    pub fn hanging() -> Self {
        Self::new(Vec::new()).when_exhausted(WhenExhausted::Hang)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Turns passed on each call, oldest first
    pub fn seen(&self) -> Vec<Vec<ConversationTurn>> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_tool_names(&self) -> Vec<String> {
        self.seen_tools.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, turns: &[ConversationTurn], tools: &[ToolDescriptor]) -> Result<ModelResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(turns.to_vec());
        *self.seen_tools.lock().unwrap() = tools.iter().map(|t| t.name.clone()).collect();

        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(message)) => Err(Error::Provider(message)),
            None => match &self.when_exhausted {
                WhenExhausted::Fail => Err(Error::Provider("script exhausted".to_string())),
                WhenExhausted::RepeatToolCall { tool, arguments } => Ok(ModelResponse::tool_calls(vec![
                    ToolCallRequest::new(format!("call_{}", n), tool.clone(), arguments.clone()),
                ])),
                WhenExhausted::Hang => std::future::pending().await,
            },
        }
    }
}

pub fn say(text: &str) -> Step {
    Step::Respond(ModelResponse::text(text))
}

pub fn call(call_id: &str, tool: &str, arguments: Value) -> Step {
    Step::Respond(ModelResponse::tool_calls(vec![ToolCallRequest::new(call_id, tool, arguments)]))
}

// ============================================================================
// In-process tool server
// ============================================================================

/// Tools shaped like a typical demo tool server
pub struct DemoTools {
    /// Without a key, `websearch` answers with an error payload
    pub search_api_key: Option<String>,
    /// Also offer `slow_lookup`, which never answers
    pub stalling: bool,
}

impl DemoTools {
    pub fn with_search_key() -> Self {
        Self {
            search_api_key: Some("test-key".to_string()),
            stalling: false,
        }
    }

    pub fn without_search_key() -> Self {
        Self {
            search_api_key: None,
            stalling: false,
        }
    }

    pub fn with_stalling_tool(mut self) -> Self {
        self.stalling = true;
        self
    }
}

#[async_trait]
impl McpHandler for DemoTools {
    async fn list_tools(&self) -> Vec<McpTool> {
        let mut tools = vec![
            McpTool::new(
                "websearch",
                "Search the web and return the top results",
                json!({
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search terms" },
                        "num_results": { "type": "integer" }
                    },
                    "required": ["query"]
                }),
            ),
            McpTool::new(
                "calculate",
                "Evaluate a sum such as 2+2",
                json!({
                    "type": "object",
                    "properties": { "expression": { "type": "string" } },
                    "required": ["expression"]
                }),
            ),
            McpTool::new("system_info", "Describe the host system", json!({ "type": "object", "properties": {} })),
        ];
        if self.stalling {
            tools.push(McpTool::new(
                "slow_lookup",
                "Look something up very slowly",
                json!({ "type": "object", "properties": {} }),
            ));
        }
        tools
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> std::result::Result<Value, String> {
        match name {
            "websearch" => {
                if self.search_api_key.is_none() {
                    return Ok(json!({
                        "error": "missing API key",
                        "suggestion": "Set SERPAPI_KEY in the tool server environment"
                    }));
                }
                let query = arguments["query"].as_str().unwrap_or_default();
                let results: Vec<Value> = (1..=5)
                    .map(|i| {
                        json!({
                            "title": format!("Result {} for {}", i, query),
                            "link": format!("https://example.com/{}", i),
                            "snippet": format!("Snippet {}", i)
                        })
                    })
                    .collect();
                Ok(json!({ "results": results }))
            }
            "calculate" => {
                let expression = arguments["expression"].as_str().unwrap_or_default();
                let mut sum = 0.0;
                for part in expression.split('+') {
                    sum += part
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| format!("cannot evaluate '{}'", expression))?;
                }
                Ok(json!({ "result": sum }))
            }
            "system_info" => Ok(json!({ "os": "testos", "cpus": 4 })),
            "slow_lookup" if self.stalling => std::future::pending().await,
            other => Err(format!("no such tool: {}", other)),
        }
    }
}

// ============================================================================
// Counting transport
// ============================================================================

/// Counts tool calls and closes seen by a transport
#[derive(Clone, Default)]
pub struct Counters {
    pub tool_calls: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl Counters {
    pub fn tool_calls(&self) -> usize {
        self.tool_calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct CountingTransport<T> {
    inner: T,
    counters: Counters,
    /// Behave like a server that dies as soon as a tool is called
    hang_up_on_call: bool,
    hung_up: bool,
}

impl<T> CountingTransport<T> {
    pub fn new(inner: T, counters: Counters) -> Self {
        Self {
            inner,
            counters,
            hang_up_on_call: false,
            hung_up: false,
        }
    }

    pub fn hanging_up_on_call(mut self) -> Self {
        self.hang_up_on_call = true;
        self
    }
}

#[async_trait]
impl<T: Transport> Transport for CountingTransport<T> {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        if message["method"] == "tools/call" {
            self.counters.tool_calls.fetch_add(1, Ordering::SeqCst);
            if self.hang_up_on_call {
                self.hung_up = true;
                return Ok(());
            }
        }
        self.inner.send(message).await
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        if self.hung_up {
            return Ok(None);
        }
        self.inner.receive().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Connect to an in-process demo tool server
pub async fn demo_connection(tools: DemoTools) -> (ToolConnection, Counters) {
    let counters = Counters::default();
    let transport = CountingTransport::new(LoopbackTransport::from_handler(tools), counters.clone());
    connect_demo(transport, counters).await
}

/// Demo tool server that completes the handshake, then dies on the first tool call
pub async fn dying_demo_connection(tools: DemoTools) -> (ToolConnection, Counters) {
    let counters = Counters::default();
    let transport =
        CountingTransport::new(LoopbackTransport::from_handler(tools), counters.clone()).hanging_up_on_call();
    connect_demo(transport, counters).await
}

async fn connect_demo<T: Transport + 'static>(transport: T, counters: Counters) -> (ToolConnection, Counters) {
    let connection = ToolConnection::with_transport("demo", Box::new(transport))
        .await
        .expect("demo tool server should connect");
    (connection, counters)
}
