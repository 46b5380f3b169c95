//! Model client trait — the abstraction over the LLM transport.
//!
//! A `ModelClient` knows how to send one conversation to the model and
//! stream back decoded events: content tokens, reasoning tokens, tool-call
//! fragments, and a final assembled message. The concrete implementation
//! (OpenAI-compatible SSE) lives in `valet-provider`; the agent loop only
//! sees this trait, so tests script it with a mock.

use crate::capability::CapabilityDefinition;
use crate::error::ProviderError;
use crate::message::{Message, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One model call: history, sampling settings, and the capability catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The model to use (e.g., "anthropic/claude-sonnet-4")
    pub model: String,

    /// The conversation messages, oldest first, system message first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Capabilities the model may call. Empty disables tool calling
    /// (the planner calls with this empty on purpose).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<CapabilityDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<CapabilityDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Strip the capability catalogue — used for the retry after a
    /// provider reports tool calling unsupported.
    pub fn without_tools(mut self) -> Self {
        self.tools.clear();
        self
    }
}

/// The message assembled by the decoder once the stream closes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssembledMessage {
    /// Final content text, or None when the model produced none
    pub content: Option<String>,

    /// Fully-assembled tool calls in index order, or None when the model
    /// requested none
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl AssembledMessage {
    /// Convert into an assistant [`Message`] ready to append to history.
    pub fn into_message(self) -> Message {
        Message::assistant_with_calls(self.content, self.tool_calls.unwrap_or_default())
    }
}

/// Decoded events for one streaming model call, in arrival order.
///
/// `Completed` is always the last event of a successful stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A content token
    Token(String),

    /// A reasoning token (dedicated field or inline-tagged)
    Reasoning(String),

    /// An incremental tool-call fragment, indexed by its position in the
    /// eventual array
    ToolCallFragment {
        index: u32,
        name: Option<String>,
        arguments: String,
    },

    /// The stream closed; carries the assembled message
    Completed(AssembledMessage),
}

/// The model transport trait.
///
/// One call → one event stream. The client does not retry; retry policy
/// (e.g. stripping tools after `ProviderError::ToolsUnsupported`) belongs
/// to the caller.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send a request and stream decoded events back.
    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<
        tokio::sync::mpsc::Receiver<std::result::Result<ChatEvent, ProviderError>>,
        ProviderError,
    >;
}
