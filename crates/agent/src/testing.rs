//! Scripted mock model client for tests.
//!
//! Each call to `stream_chat` consumes the next scripted entry: an
//! assembled message is replayed as a token stream followed by
//! `Completed`, an error is returned before any event. Requests are
//! recorded so tests can assert on what was actually sent (history
//! windows, stripped tool definitions, and so on).

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use valet_core::error::ProviderError;
use valet_core::message::ToolCall;
use valet_core::model::{AssembledMessage, ChatEvent, ChatRequest, ModelClient};

/// A mock client that returns a sequence of scripted responses.
///
/// Panics if more calls are made than responses provided.
pub struct ScriptedClient {
    responses: Mutex<Vec<Result<AssembledMessage, ProviderError>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    cursor: Mutex<usize>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Result<AssembledMessage, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Arc::new(Mutex::new(Vec::new())),
            cursor: Mutex::new(0),
        }
    }

    /// Shared handle to the recorded requests.
    pub fn requests(&self) -> Arc<Mutex<Vec<ChatRequest>>> {
        self.requests.clone()
    }

    pub fn call_count(&self) -> usize {
        *self.cursor.lock().unwrap()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream_chat(
        &self,
        request: ChatRequest,
    ) -> Result<mpsc::Receiver<Result<ChatEvent, ProviderError>>, ProviderError> {
        self.requests.lock().unwrap().push(request);

        let next = {
            let mut cursor = self.cursor.lock().unwrap();
            let responses = self.responses.lock().unwrap();
            if *cursor >= responses.len() {
                panic!(
                    "ScriptedClient: no more responses (call #{}, have {})",
                    *cursor + 1,
                    responses.len()
                );
            }
            let next = responses[*cursor].clone();
            *cursor += 1;
            next
        };

        let assembled = next?;

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            if let Some(content) = &assembled.content {
                let _ = tx.send(Ok(ChatEvent::Token(content.clone()))).await;
            }
            let _ = tx.send(Ok(ChatEvent::Completed(assembled))).await;
        });
        Ok(rx)
    }
}

/// An assembled message carrying only text.
pub fn assembled_text(text: &str) -> AssembledMessage {
    AssembledMessage {
        content: Some(text.to_string()),
        tool_calls: None,
    }
}

/// An assembled message carrying one tool call and no content.
pub fn assembled_tool_call(id: &str, name: &str, arguments: &str) -> AssembledMessage {
    AssembledMessage {
        content: None,
        tool_calls: Some(vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }]),
    }
}
