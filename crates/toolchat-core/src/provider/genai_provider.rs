//! GenAI-based model provider
//!
//! Uses the genai framework with manual tool control: the model only
//! requests tool calls, and the orchestration loop decides how to run them.
//! Responses are streamed to avoid request timeouts on long generations.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use genai::chat::{ChatMessage, ChatRequest, ChatStreamEvent, Tool, ToolCall, ToolResponse};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client, WebConfig};
use tracing::{debug, error};

use super::catalog::ProviderType;
use super::logging::{LogConfig, log_llm_interaction};
use super::{ModelProvider, ModelResponse};
use crate::connection::ToolDescriptor;
use crate::error::{Error, Result};
use crate::formatting::format_tool_result_for_model;
use crate::system_prompt::DEFAULT_SYSTEM_PROMPT;
use crate::turn::{ConversationTurn, Role, ToolCallRequest, TurnContent};

/// A provider implementation using genai
pub struct GenAIProvider {
    client: Client,
    provider_type: ProviderType,
    model: String,
    system_prompt: Option<String>,
}

impl GenAIProvider {
    /// Default timeout for LLM API requests (5 minutes)
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    fn default_web_config() -> WebConfig {
        WebConfig::default()
            .with_timeout(Self::DEFAULT_TIMEOUT)
            .with_connect_timeout(Duration::from_secs(30))
    }

    /// Create a new provider with default settings (uses environment variables for auth)
    pub fn new(provider_type: ProviderType, model: Option<&str>) -> Self {
        let client = Client::builder().with_web_config(Self::default_web_config()).build();
        Self {
            client,
            provider_type,
            model: model.unwrap_or(provider_type.default_model()).to_string(),
            system_prompt: None,
        }
    }

    /// Create a provider with a specific API key
    pub fn with_api_key(provider_type: ProviderType, api_key: &str, model: Option<&str>) -> Self {
        let api_key = api_key.to_string();
        let auth_resolver = AuthResolver::from_resolver_fn(
            move |_model_iden| -> std::result::Result<Option<AuthData>, genai::resolver::Error> {
                Ok(Some(AuthData::from_single(api_key.clone())))
            },
        );

        let client = Client::builder()
            .with_web_config(Self::default_web_config())
            .with_auth_resolver(auth_resolver)
            .build();

        Self {
            client,
            provider_type,
            model: model.unwrap_or(provider_type.default_model()).to_string(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the genai request for a turn sequence
    ///
    /// Tool calls become assistant tool-call messages and their results tool
    /// responses, so each call/result pair reaches the model adjacently.
    fn build_request(&self, turns: &[ConversationTurn], tools: &[ToolDescriptor]) -> ChatRequest {
        let mut chat_req = ChatRequest::default();

        if let Some(system) = &self.system_prompt {
            chat_req = chat_req.with_system(system.as_str());
        }

        for turn in turns {
            chat_req = match (&turn.role, &turn.content) {
                (Role::User, TurnContent::Text { text }) => chat_req.append_message(ChatMessage::user(text.as_str())),
                (_, TurnContent::Text { text }) if text.is_empty() => chat_req,
                (_, TurnContent::Text { text }) => chat_req.append_message(ChatMessage::assistant(text.as_str())),
                (_, TurnContent::ToolCall(call)) => chat_req.append_message(vec![ToolCall {
                    call_id: call.call_id.clone(),
                    fn_name: call.tool_name.clone(),
                    fn_arguments: call.arguments.clone(),
                    thought_signatures: None,
                }]),
                (_, TurnContent::ToolResult { call_id, result }) => chat_req.append_message(ToolResponse::new(
                    call_id.clone(),
                    format_tool_result_for_model(result),
                )),
            };
        }

        if !tools.is_empty() {
            let genai_tools: Vec<Tool> = tools
                .iter()
                .map(|t| {
                    Tool::new(&t.name)
                        .with_description(&t.description)
                        .with_schema(t.input_schema.clone())
                })
                .collect();
            chat_req = chat_req.with_tools(genai_tools);
        }

        chat_req
    }

    fn log(&self, turns: &[ConversationTurn], tools: &[ToolDescriptor], result: Option<&ModelResponse>, err: Option<&str>) {
        log_llm_interaction(LogConfig {
            model: &self.model,
            provider: Some(self.provider_type.as_str()),
            system_prompt: self.system_prompt.as_deref(),
            turns,
            tools: Some(tools),
            result,
            error: err,
        });
    }
}

#[async_trait]
impl ModelProvider for GenAIProvider {
    fn name(&self) -> &str {
        self.provider_type.as_str()
    }

    async fn generate(&self, turns: &[ConversationTurn], tools: &[ToolDescriptor]) -> Result<ModelResponse> {
        let chat_req = self.build_request(turns, tools);

        let stream_response = match self.client.exec_chat_stream(&self.model, chat_req, None).await {
            Ok(response) => response,
            Err(e) => {
                let error_msg = format!("GenAI error: {:?}", e);
                self.log(turns, tools, None, Some(&error_msg));
                error!(error = ?e, model = %self.model, "LLM request failed");
                return Err(Error::Provider(error_msg));
            }
        };

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut stream = stream_response.stream;

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatStreamEvent::Chunk(chunk)) => {
                    content.push_str(&chunk.content);
                }
                Ok(ChatStreamEvent::ToolCallChunk(tc)) => {
                    // Each ToolCallChunk carries a complete call
                    let call = tc.tool_call;
                    let call_id = if call.call_id.is_empty() {
                        format!("call_{}", uuid::Uuid::new_v4().simple())
                    } else {
                        call.call_id
                    };
                    tool_calls.push(ToolCallRequest::new(call_id, call.fn_name, call.fn_arguments));
                }
                Ok(ChatStreamEvent::End(_)) => break,
                // Reasoning and other stream events are not part of the answer
                Ok(_) => {}
                Err(e) => {
                    let error_msg = format!("GenAI stream error: {:?}", e);
                    self.log(turns, tools, None, Some(&error_msg));
                    error!(error = ?e, model = %self.model, "LLM stream error");
                    return Err(Error::Provider(error_msg));
                }
            }
        }

        let response = ModelResponse {
            text: if content.is_empty() { None } else { Some(content) },
            tool_calls,
        };

        debug!(
            model = %self.model,
            tool_calls = response.tool_calls.len(),
            has_text = response.text.is_some(),
            "Model responded"
        );
        self.log(turns, tools, Some(&response), None);

        Ok(response)
    }
}

/// Create a provider from configuration
pub fn create_provider(
    provider_type: ProviderType,
    api_key: Option<&str>,
    model: Option<&str>,
    system_prompt: Option<&str>,
) -> GenAIProvider {
    let provider = match api_key {
        Some(key) => GenAIProvider::with_api_key(provider_type, key, model),
        None => GenAIProvider::new(provider_type, model),
    };

    provider.with_system_prompt(system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT))
}
