//! Tool-calling orchestration loop
//!
//! Drives one query to completion: the model is asked for a response, any
//! tool calls it requests are executed one at a time over the connection,
//! and their results are fed back until the model answers in plain text or
//! the round limit is reached.
//!
//! ```text
//! AWAITING_MODEL --text--> DONE
//!       |  ^
//!  calls|  |results
//!       v  |
//! EXECUTING_TOOL
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LoopConfig;
use crate::connection::ToolConnection;
use crate::error::{Result, ToolError};
use crate::formatting::{format_result_summary, format_tool_call, truncate_result};
use crate::provider::ModelProvider;
use crate::turn::{ConversationTurn, Role, Transcript, TurnContent};

/// Per-query round bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundState {
    /// Model calls made so far
    pub iteration: usize,
    pub max_iterations: usize,
    /// Turns appended since the query started
    pub turns_this_query: usize,
}

impl RoundState {
    /// A limit of zero is treated as one
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations: max_iterations.max(1),
            turns_this_query: 0,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.iteration >= self.max_iterations
    }
}

/// How a query ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    /// The model produced a final answer
    Completed,
    /// The round limit was hit first
    Incomplete,
}

/// Result of running one query through the loop
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    /// Final answer, or best partial text annotated as incomplete
    pub text: String,
    /// Every turn appended for this query, the user turn first
    pub new_turns: Vec<ConversationTurn>,
    /// Model calls made
    pub rounds: usize,
    /// Tool calls executed, including rejected ones
    pub tool_calls: usize,
}

impl LoopOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == LoopStatus::Completed
    }
}

/// The orchestration loop, borrowing its provider and settings
pub struct ToolLoop<'a> {
    provider: &'a dyn ModelProvider,
    config: &'a LoopConfig,
}

impl<'a> ToolLoop<'a> {
    pub fn new(provider: &'a dyn ModelProvider, config: &'a LoopConfig) -> Self {
        Self { provider, config }
    }

    /// Run `query` on top of `context`
    ///
    /// New turns are appended to `context` as they happen. A provider failure
    /// or a lost tool server ends the query immediately with no retry; tool
    /// failures never do.
    pub async fn run(&self, context: &mut Transcript, query: &str, connection: &mut ToolConnection) -> Result<LoopOutcome> {
        let start = context.len();
        let tools = connection.descriptors().to_vec();
        let mut state = RoundState::new(self.config.max_iterations);
        let mut tool_calls = 0;

        context.push_user(query);

        loop {
            state.turns_this_query = context.len() - start;

            if state.exhausted() {
                warn!(
                    rounds = state.iteration,
                    max_iterations = state.max_iterations,
                    "Round limit reached without a final answer"
                );
                let partial = last_assistant_text(context.since(start));
                return Ok(LoopOutcome {
                    status: LoopStatus::Incomplete,
                    text: incomplete_text(partial, state.iteration),
                    new_turns: context.since(start).to_vec(),
                    rounds: state.iteration,
                    tool_calls,
                });
            }

            state.iteration += 1;
            debug!(
                iteration = state.iteration,
                turns = context.len(),
                tool_count = tools.len(),
                "Requesting model response"
            );

            let response = self.provider.generate(context.turns(), &tools).await?;

            if !response.has_tool_calls() {
                let text = response.text.unwrap_or_default();
                context.push_assistant(text.clone());
                info!(rounds = state.iteration, tool_calls, "Query completed");
                return Ok(LoopOutcome {
                    status: LoopStatus::Completed,
                    text,
                    new_turns: context.since(start).to_vec(),
                    rounds: state.iteration,
                    tool_calls,
                });
            }

            if let Some(text) = response.content() {
                context.push_assistant(text);
            }

            // Calls run in model order, each result appended before the next call
            for call in response.tool_calls {
                tool_calls += 1;
                info!(call_id = %call.call_id, "Calling {}", format_tool_call(&call.tool_name, &call.arguments));

                // Losing the server ends the query; tool failures don't
                let result = if connection.has_tool(&call.tool_name) {
                    connection.invoke(&call.tool_name, &call.arguments).await?
                } else {
                    warn!(tool = %call.tool_name, "Model requested an unknown tool");
                    ToolError::UnknownTool(call.tool_name.clone()).into()
                };

                debug!(
                    call_id = %call.call_id,
                    ok = result.is_ok(),
                    "{} -> {}",
                    call.tool_name,
                    format_result_summary(&result)
                );

                let result = truncate_result(result, self.config.max_tool_result_chars);
                context.push_tool_exchange(call, result);
            }
        }
    }
}

fn last_assistant_text(turns: &[ConversationTurn]) -> Option<&str> {
    turns.iter().rev().find_map(|turn| match (&turn.role, &turn.content) {
        (Role::Assistant, TurnContent::Text { text }) if !text.trim().is_empty() => Some(text.as_str()),
        _ => None,
    })
}

fn incomplete_text(partial: Option<&str>, rounds: usize) -> String {
    let note = format!("[Incomplete: no final answer after {} model rounds]", rounds);
    match partial {
        Some(text) => format!("{}\n\n{}", text, note),
        None => note,
    }
}
