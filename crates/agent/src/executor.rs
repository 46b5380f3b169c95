//! The step executor — Valet's bounded tool-calling loop.
//!
//! One run drives one prompt to a final answer: call the model with recent
//! history and the capability catalogue, append what comes back, dispatch
//! any requested capabilities, feed their results in, and repeat until the
//! model stops asking for tools or the iteration cap is hit. Every message
//! is durably appended as it is produced, never batched, so a mid-loop
//! crash leaves a consistent, replayable history.
//!
//! Failure rules: a transport failure aborts the run and surfaces to the
//! caller; a dispatch failure is just another tool result the model gets
//! to react to.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use valet_core::capability::CapabilityRegistry;
use valet_core::error::{Error, ProviderError};
use valet_core::event::AssistantEvent;
use valet_core::message::{ConversationId, Message};
use valet_core::model::{AssembledMessage, ChatEvent, ChatRequest, ModelClient};
use valet_core::store::ConversationStore;

/// Model invocations per run, including the one that produces the final
/// answer.
pub const MAX_ITERATIONS: u32 = 15;

/// How many recent messages are replayed to the model each iteration.
pub const HISTORY_WINDOW: usize = 50;

/// Options for one executor run.
pub struct RunOptions {
    /// Append the prompt as a user message first. Mid-plan steps sharing
    /// one conversation pass `false` after the first step.
    pub record_user_message: bool,

    /// "Current step" focus block appended to the system prompt.
    pub step_focus: Option<String>,

    /// Streaming sink; `None` for non-streaming callers.
    pub events: Option<mpsc::Sender<AssistantEvent>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            record_user_message: true,
            step_focus: None,
            events: None,
        }
    }
}

/// The tool-calling loop.
pub struct StepExecutor {
    client: Arc<dyn ModelClient>,
    registry: Arc<CapabilityRegistry>,
    store: Arc<dyn ConversationStore>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
}

impl StepExecutor {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<CapabilityRegistry>,
        store: Arc<dyn ConversationStore>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            client,
            registry,
            store,
            model: model.into(),
            temperature,
            max_tokens: None,
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Override the iteration cap (tests use small values).
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run one prompt to completion against a conversation and return the
    /// final answer.
    pub async fn run(
        &self,
        conversation_id: &ConversationId,
        system_prompt: &str,
        prompt: &str,
        options: RunOptions,
    ) -> Result<String, Error> {
        if options.record_user_message {
            self.store
                .append_message(conversation_id, &Message::user(prompt))
                .await?;
        }

        let system_text = match &options.step_focus {
            Some(focus) => format!("{system_prompt}\n\n## Current step\n{focus}"),
            None => system_prompt.to_string(),
        };

        let tool_definitions = self.registry.definitions();
        let mut last_content: Option<String> = None;

        for iteration in 1..=self.max_iterations {
            debug!(conversation_id = %conversation_id, iteration, "Executor iteration");

            let history = self
                .store
                .recent_messages(conversation_id, HISTORY_WINDOW)
                .await?;
            let mut messages = vec![Message::system(&system_text)];
            messages.extend(history);

            let mut request = ChatRequest::new(&self.model, messages).with_tools(tool_definitions.clone());
            request.temperature = self.temperature;
            request.max_tokens = self.max_tokens;

            let assembled = self.stream_once(request, options.events.as_ref()).await?;
            let assistant = assembled.into_message();
            let tool_calls = assistant.tool_calls.clone();
            last_content = assistant.content.clone();
            self.store.append_message(conversation_id, &assistant).await?;

            if tool_calls.is_empty() {
                let answer = last_content.unwrap_or_default();
                info!(conversation_id = %conversation_id, iterations = iteration, "Run complete");
                return Ok(answer);
            }

            // Dispatch each requested capability in order; failures become
            // tool results, not aborts.
            for call in &tool_calls {
                if let Some(tx) = &options.events {
                    let _ = tx
                        .send(AssistantEvent::ToolStart {
                            name: call.name.clone(),
                            arguments: call.arguments.clone(),
                        })
                        .await;
                }

                let outcome = self.registry.dispatch(&call.name, &call.arguments).await;

                if let Some(tx) = &options.events {
                    let _ = tx
                        .send(AssistantEvent::ToolEnd {
                            name: call.name.clone(),
                            result: outcome.result.clone(),
                        })
                        .await;
                }

                self.store
                    .append_message(conversation_id, &Message::tool_result(&call.id, &outcome.result))
                    .await?;
            }
        }

        // Cap reached with tool calls still pending
        warn!(
            conversation_id = %conversation_id,
            cap = self.max_iterations,
            "Iteration cap reached, truncating"
        );
        let notice = format!(
            "[Stopped after reaching the {} tool-call iteration limit — the answer above may be incomplete.]",
            self.max_iterations
        );
        let answer = match last_content.filter(|c| !c.is_empty()) {
            Some(content) => format!("{content}\n\n{notice}"),
            None => notice.clone(),
        };

        if let Some(tx) = &options.events {
            let _ = tx
                .send(AssistantEvent::Token {
                    text: format!("\n\n{notice}"),
                })
                .await;
        }
        self.store
            .append_message(conversation_id, &Message::assistant(&answer))
            .await?;

        Ok(answer)
    }

    /// One model call through the stream decoder. Retries exactly once
    /// with tool definitions stripped when the provider reports tool
    /// calling unsupported.
    async fn stream_once(
        &self,
        request: ChatRequest,
        events: Option<&mpsc::Sender<AssistantEvent>>,
    ) -> Result<AssembledMessage, Error> {
        let rx = match self.client.stream_chat(request.clone()).await {
            Ok(rx) => rx,
            Err(ProviderError::ToolsUnsupported(reason)) => {
                warn!(reason = %reason, "Tools unsupported, retrying without definitions");
                self.client.stream_chat(request.without_tools()).await?
            }
            Err(e) => return Err(e.into()),
        };

        self.consume_stream(rx, events).await
    }

    async fn consume_stream(
        &self,
        mut rx: mpsc::Receiver<Result<ChatEvent, ProviderError>>,
        events: Option<&mpsc::Sender<AssistantEvent>>,
    ) -> Result<AssembledMessage, Error> {
        while let Some(event) = rx.recv().await {
            match event? {
                ChatEvent::Token(text) => {
                    if let Some(tx) = events {
                        let _ = tx.send(AssistantEvent::Token { text }).await;
                    }
                }
                ChatEvent::Reasoning(text) => {
                    if let Some(tx) = events {
                        let _ = tx.send(AssistantEvent::Reasoning { text }).await;
                    }
                }
                ChatEvent::ToolCallFragment { .. } => {}
                ChatEvent::Completed(assembled) => return Ok(assembled),
            }
        }
        Err(ProviderError::StreamInterrupted("Stream closed without completing".into()).into())
    }
}
