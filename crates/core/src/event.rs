//! Assistant-level streaming events.
//!
//! `AssistantEvent` is the taxonomy the engine emits to its callers over a
//! channel while a turn runs: tokens and reasoning as they stream, tool
//! dispatch boundaries, one terminal `Error` on chat-facing failure, and a
//! final `Done` sentinel after which nothing else arrives.

use crate::error::Result;
use crate::message::ConversationId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Events emitted by the assistant during a streaming turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantEvent {
    /// A content fragment of the answer.
    Token { text: String },

    /// A reasoning fragment — surfaced for transparency, not part of the
    /// answer.
    Reasoning { text: String },

    /// A capability dispatch is starting.
    ToolStart { name: String, arguments: String },

    /// A capability dispatch finished.
    ToolEnd { name: String, result: String },

    /// A chat-facing error. Followed by `Done`.
    Error { message: String },

    /// Terminal sentinel — no further events.
    Done,
}

impl AssistantEvent {
    /// Wire event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Reasoning { .. } => "reasoning",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolEnd { .. } => "tool_end",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }
}

/// The result of one non-streaming turn.
#[derive(Debug, Clone)]
pub struct TurnOutput {
    /// The conversation the turn ran against (freshly created if the
    /// caller passed none).
    pub conversation_id: ConversationId,

    /// The final answer text.
    pub answer: String,
}

/// One full plan-or-direct turn without streaming.
///
/// Implemented by the assistant service; the scheduler re-enters the
/// engine through this trait so it never depends on the agent crate's
/// internals.
#[async_trait]
pub trait TurnRunner: Send + Sync {
    async fn run_turn(
        &self,
        conversation_id: Option<ConversationId>,
        prompt: &str,
    ) -> Result<TurnOutput>;
}
