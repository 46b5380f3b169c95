//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use valet_core::error::StorageError;
use valet_core::message::{Conversation, ConversationId, Message};
use valet_core::store::{ConversationStore, TaskStore};
use valet_core::task::{ScheduledTask, TaskRunLog, TaskStatus};

/// An in-memory store backed by maps. Not durable; behaves like the
/// SQLite store from the engine's point of view.
pub struct InMemoryStore {
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
    tasks: Arc<RwLock<HashMap<String, ScheduledTask>>>,
    runs: Arc<RwLock<Vec<TaskRunLog>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
            tasks: Arc::new(RwLock::new(HashMap::new())),
            runs: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn create_conversation(&self) -> Result<Conversation, StorageError> {
        let conv = Conversation::new();
        self.conversations
            .write()
            .await
            .insert(conv.id.to_string(), conv.clone());
        Ok(conv)
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        Ok(self.conversations.read().await.get(&id.to_string()).cloned())
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        message: &Message,
    ) -> Result<(), StorageError> {
        let mut conversations = self.conversations.write().await;
        let conv = conversations
            .get_mut(&id.to_string())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        conv.push(message.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, StorageError> {
        let conversations = self.conversations.read().await;
        let conv = conversations
            .get(&id.to_string())
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let skip = conv.messages.len().saturating_sub(limit);
        Ok(conv.messages[skip..].to_vec())
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn create_task(&self, task: &ScheduledTask) -> Result<(), StorageError> {
        self.tasks
            .write()
            .await
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>, StorageError> {
        Ok(self.tasks.read().await.get(id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>, StorageError> {
        let mut tasks: Vec<_> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn update_task(&self, task: &ScheduledTask) -> Result<(), StorageError> {
        let mut tasks = self.tasks.write().await;
        if !tasks.contains_key(&task.id) {
            return Err(StorageError::NotFound(task.id.clone()));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<bool, StorageError> {
        let removed = self.tasks.write().await.remove(id).is_some();
        self.runs.write().await.retain(|r| r.task_id != id);
        Ok(removed)
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>, StorageError> {
        let mut due: Vec<_> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| {
                t.status == TaskStatus::Active
                    && t.next_run.is_some_and(|next| next <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|t| t.next_run);
        Ok(due)
    }

    async fn append_run(&self, log: &TaskRunLog) -> Result<(), StorageError> {
        self.runs.write().await.push(log.clone());
        Ok(())
    }

    async fn runs_for(
        &self,
        task_id: &str,
        limit: usize,
    ) -> Result<Vec<TaskRunLog>, StorageError> {
        let runs = self.runs.read().await;
        let mut matching: Vec<_> = runs
            .iter()
            .filter(|r| r.task_id == task_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        matching.truncate(limit);
        Ok(matching)
    }
}
