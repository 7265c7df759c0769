//! MCP Transport layer implementations

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::protocol::{IncomingMessage, JsonRpcError, JsonRpcResponse};
use crate::server::{McpHandler, McpServer};

/// How long a server gets to exit on its own after stdin closes
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Transport trait for MCP communication
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&mut self, message: Value) -> io::Result<()>;
    /// Next message from the peer, `None` once the peer has gone away
    async fn receive(&mut self) -> io::Result<Option<Value>>;
    async fn close(&mut self) -> io::Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        (**self).send(message).await
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        (**self).receive().await
    }

    async fn close(&mut self) -> io::Result<()> {
        (**self).close().await
    }
}

/// Stdio transport for subprocess communication
///
/// Messages are newline-delimited JSON on the child's stdin/stdout. The
/// child's stderr is inherited so server diagnostics stay visible without
/// polluting the protocol stream.
pub struct StdioTransport {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: Option<BufReader<ChildStdout>>,
    closed: bool,
}

impl StdioTransport {
    /// Spawn `command` with extra environment variables and an optional working directory
    pub async fn spawn_with(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        cwd: Option<&Path>,
    ) -> io::Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "Failed to capture stdin")
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "Failed to capture stdout")
        })?;

        debug!(command, ?args, pid = ?child.id(), "Spawned tool server");

        Ok(Self {
            child,
            stdin: Some(stdin),
            reader: Some(BufReader::new(stdout)),
            closed: false,
        })
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "Stdin not available")
        })?;

        let json = serde_json::to_string(&message)?;
        stdin.write_all(json.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;

        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "Reader not available")
        })?;

        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).await?;

            if n == 0 {
                return Ok(None);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            // Servers sometimes print banners on stdout; skip anything that isn't JSON
            match serde_json::from_str::<Value>(trimmed) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => warn!(line = %trimmed, error = %e, "Skipping non-JSON line from tool server"),
            }
        }
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Dropping stdin lets well-behaved servers exit on EOF
        self.stdin.take();
        self.reader.take();

        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(%status, "Tool server exited");
            }
            Err(_) => {
                warn!(grace_ms = EXIT_GRACE.as_millis() as u64, "Tool server still running after EOF, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

/// In-process transport that hands every request straight to an [`McpServer`]
///
/// Responses are queued and handed out by `receive` in order. Useful for
/// hosting tools inside the current process and for tests.
pub struct LoopbackTransport<H: McpHandler> {
    server: Arc<McpServer<H>>,
    pending: VecDeque<Value>,
    closed: bool,
}

impl<H: McpHandler> LoopbackTransport<H> {
    pub fn new(server: Arc<McpServer<H>>) -> Self {
        Self {
            server,
            pending: VecDeque::new(),
            closed: false,
        }
    }

    pub fn from_handler(handler: H) -> Self {
        Self::new(Arc::new(McpServer::new(Arc::new(handler))))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[async_trait]
impl<H: McpHandler + 'static> Transport for LoopbackTransport<H> {
    async fn send(&mut self, message: Value) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "Loopback transport closed"));
        }

        match IncomingMessage::classify(message) {
            Some(IncomingMessage::Request(request)) => {
                let response = self.server.handle_request(request).await;
                self.pending.push_back(serde_json::to_value(response)?);
            }
            Some(IncomingMessage::Notification(notification)) => {
                debug!(method = %notification.method, "Loopback notification");
            }
            Some(IncomingMessage::Response(_)) | None => {
                let response = JsonRpcResponse {
                    jsonrpc: crate::protocol::JSONRPC_VERSION.to_string(),
                    id: None,
                    result: None,
                    error: Some(JsonRpcError::invalid_request()),
                };
                self.pending.push_back(serde_json::to_value(response)?);
            }
        }
        Ok(())
    }

    async fn receive(&mut self) -> io::Result<Option<Value>> {
        if self.closed {
            return Ok(None);
        }
        Ok(self.pending.pop_front())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }
}
