//! Chat session management
//!
//! A [`ChatSession`] is the façade presentation layers talk to. It owns the
//! conversation, at most one tool server connection, and the model provider,
//! and it always answers with text: failures become user-facing sentences.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{LauncherConfig, LoopConfig};
use crate::connection::ToolConnection;
use crate::error::{Error, Result};
use crate::history::{PlainEntry, decode_into_transcript};
use crate::orchestrator::{LoopOutcome, ToolLoop};
use crate::provider::ModelProvider;
use crate::target::TargetRef;
use crate::turn::{ConversationTurn, Transcript};

/// Reply when a query arrives with no tool server connected
pub const NOT_CONNECTED_MESSAGE: &str = "Not connected to a tool server. Please connect to a server first.";

/// Reply when a query is cancelled before it finishes
pub const CANCELLED_MESSAGE: &str = "Request cancelled.";

/// Reply after the conversation is cleared
pub const HISTORY_CLEARED_MESSAGE: &str = "Conversation history cleared!";

/// Render an error the way the user should read it
pub fn error_sentence(err: &Error) -> String {
    match err {
        Error::NotConnected => NOT_CONNECTED_MESSAGE.to_string(),
        Error::Cancelled => CANCELLED_MESSAGE.to_string(),
        Error::Connection(e) => format!("Error connecting to tool server: {}", e),
        other => format!("Error processing query: {}", other),
    }
}

/// One conversation with one (optional) tool server
pub struct ChatSession {
    id: String,
    created_at: DateTime<Utc>,
    transcript: Transcript,
    connection: Option<ToolConnection>,
    provider: Arc<dyn ModelProvider>,
    loop_config: LoopConfig,
    launcher: LauncherConfig,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn ModelProvider>, loop_config: LoopConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            transcript: Transcript::new(),
            connection: None,
            provider,
            loop_config,
            launcher: LauncherConfig::default(),
        }
    }

    pub fn with_launcher(mut self, launcher: LauncherConfig) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        self.transcript.turns()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| !c.is_closed())
    }

    pub fn connection(&self) -> Option<&ToolConnection> {
        self.connection.as_ref()
    }

    /// Start and connect to `target`, replacing any current connection
    pub async fn connect(&mut self, target: &TargetRef) -> Result<()> {
        self.cleanup().await;
        let connection = ToolConnection::connect(target, &self.launcher).await?;
        self.connection = Some(connection);
        Ok(())
    }

    /// Use an already established connection, replacing any current one
    pub async fn attach(&mut self, connection: ToolConnection) {
        self.cleanup().await;
        self.connection = Some(connection);
    }

    /// Close the current server, connect to another and start a fresh conversation
    ///
    /// Returns the notice to show the user. If the new server can't be
    /// reached the session is left unconnected.
    pub async fn switch_target(&mut self, target: &TargetRef) -> String {
        self.transcript.clear();
        match self.connect(target).await {
            Ok(()) => {
                info!(session = %self.id, target_ref = %target, "Switched tool server");
                format!("Connected to tool server: {}", target.label())
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Failed to switch tool server");
                error_sentence(&e)
            }
        }
    }

    /// Run a query and report the full outcome
    ///
    /// With `history`, the decoded history replaces the session's own turns
    /// as context for this query. Turns are committed to the session only
    /// once the query finishes.
    pub async fn run_query(&mut self, text: &str, history: Option<&[PlainEntry]>) -> Result<LoopOutcome> {
        let connection = self.connection.as_mut().ok_or(Error::NotConnected)?;
        if connection.is_closed() {
            return Err(Error::NotConnected);
        }

        let mut context = match history {
            Some(plain) => decode_into_transcript(plain),
            None => self.transcript.clone(),
        };

        let tool_loop = ToolLoop::new(self.provider.as_ref(), &self.loop_config);
        let outcome = tool_loop.run(&mut context, text, connection).await?;

        self.transcript.extend_from(&outcome.new_turns);
        Ok(outcome)
    }

    /// Answer a query using the session's own conversation
    pub async fn process_query(&mut self, text: &str) -> String {
        self.reply(text, None).await
    }

    /// Answer a query in the context of caller-held history
    pub async fn process_query_with_history(&mut self, text: &str, history: &[PlainEntry]) -> String {
        self.reply(text, Some(history)).await
    }

    /// Answer a query unless `token` fires first
    ///
    /// On cancellation the partial round is discarded and the session's
    /// connection is closed.
    pub async fn process_query_cancellable(
        &mut self,
        text: &str,
        history: Option<&[PlainEntry]>,
        token: &CancellationToken,
    ) -> String {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = self.run_query(text, history) => Some(result),
        };

        match result {
            Some(result) => self.render(result),
            None => {
                info!(session = %self.id, "Query cancelled");
                self.cleanup().await;
                CANCELLED_MESSAGE.to_string()
            }
        }
    }

    async fn reply(&mut self, text: &str, history: Option<&[PlainEntry]>) -> String {
        let result = self.run_query(text, history).await;
        self.render(result)
    }

    fn render(&self, result: Result<LoopOutcome>) -> String {
        match result {
            Ok(outcome) => outcome.text,
            Err(e) => {
                error!(session = %self.id, error = %e, "Query failed");
                error_sentence(&e)
            }
        }
    }

    /// Forget the conversation, keeping the connection
    pub fn clear(&mut self) -> &'static str {
        self.transcript.clear();
        HISTORY_CLEARED_MESSAGE
    }

    /// Close the connection if one is open; safe to call repeatedly
    ///
    /// Returns whether anything was closed.
    pub async fn cleanup(&mut self) -> bool {
        match self.connection.take() {
            Some(mut connection) => connection.close().await,
            None => false,
        }
    }
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("id", &self.id)
            .field("turns", &self.transcript.len())
            .field("connection", &self.connection)
            .field("provider", &self.provider.name())
            .finish()
    }
}
