//! Store traits — the persistence contracts the engine depends on.
//!
//! The engine assumes a conventional record store and nothing more: the
//! SQLite implementation lives in `valet-storage`, and tests use the
//! in-memory one. Messages are appended one at a time, durably, in the
//! order the executor produced them, so a mid-loop crash leaves a
//! consistent, replayable history.

use crate::error::StorageError;
use crate::message::{Conversation, ConversationId, Message};
use crate::task::{ScheduledTask, TaskRunLog};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Conversation persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create a new empty conversation and return it.
    async fn create_conversation(&self) -> Result<Conversation, StorageError>;

    /// Load a conversation with all of its messages.
    async fn get_conversation(&self, id: &ConversationId)
    -> Result<Option<Conversation>, StorageError>;

    /// Durably append one message to a conversation.
    async fn append_message(
        &self,
        id: &ConversationId,
        message: &Message,
    ) -> Result<(), StorageError>;

    /// The most recent `limit` messages, oldest first.
    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, StorageError>;
}

/// Scheduled task persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persist a new task.
    async fn create_task(&self, task: &ScheduledTask) -> Result<(), StorageError>;

    /// Load a task by id.
    async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>, StorageError>;

    /// All tasks, newest first.
    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>, StorageError>;

    /// Overwrite a task's mutable fields.
    async fn update_task(&self, task: &ScheduledTask) -> Result<(), StorageError>;

    /// Delete a task and its entire run log. Irreversible.
    async fn delete_task(&self, id: &str) -> Result<bool, StorageError>;

    /// Tasks with status `active` and a next-eligible-time at or before
    /// `now`. Paused, completed, and errored tasks are never returned,
    /// whatever their stored next_run says.
    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>, StorageError>;

    /// Append one run-log row.
    async fn append_run(&self, log: &TaskRunLog) -> Result<(), StorageError>;

    /// The most recent `limit` run-log rows for a task, newest first.
    async fn runs_for(&self, task_id: &str, limit: usize)
    -> Result<Vec<TaskRunLog>, StorageError>;
}
