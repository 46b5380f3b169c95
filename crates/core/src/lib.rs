//! # Valet Core
//!
//! Domain types, traits, and error definitions for the Valet assistant engine.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod capability;
pub mod error;
pub mod event;
pub mod message;
pub mod model;
pub mod store;
pub mod task;

// Re-export key types at crate root for ergonomics
pub use capability::{Capability, CapabilityDefinition, CapabilityOutput, CapabilityRegistry, DispatchOutcome};
pub use error::{Error, Result};
pub use event::{AssistantEvent, TurnOutput, TurnRunner};
pub use message::{Conversation, ConversationId, Message, Role, ToolCall};
pub use model::{AssembledMessage, ChatEvent, ChatRequest, ModelClient};
pub use store::{ConversationStore, TaskStore};
pub use task::{CreateTask, RunOutcome, ScheduleKind, ScheduledTask, TaskRunLog, TaskStatus};
