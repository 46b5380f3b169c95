//! SQLite store for conversations, messages, tasks, and run logs.
//!
//! Uses a single SQLite database file in WAL mode. All tables are created
//! at open with IF-NOT-EXISTS migrations. Timestamps are stored as
//! fixed-width UTC strings (millisecond precision, `Z` suffix) so lexical
//! comparison in SQL matches chronological order — the due-task query
//! relies on this.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use valet_core::error::StorageError;
use valet_core::message::{Conversation, ConversationId, Message, Role, ToolCall};
use valet_core::store::{ConversationStore, TaskStore};
use valet_core::task::{RunOutcome, ScheduleKind, ScheduledTask, TaskRunLog, TaskStatus};

/// Serialize a timestamp for storage.
fn ts_to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp.
fn ts_from_db(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Backend(format!("Bad timestamp '{s}': {e}")))
}

/// The production SQLite store. Implements both store traits.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// The pool holds several connections, so `:memory:` would give each
    /// connection its own database — use a temp file for ephemeral stores.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Backend(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id          TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("conversations table: {e}")))?;

        // iid gives a strict append order within a conversation
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT UNIQUE NOT NULL,
                conversation_id TEXT NOT NULL,
                role            TEXT NOT NULL,
                content         TEXT,
                tool_calls      TEXT NOT NULL DEFAULT '[]',
                tool_call_id    TEXT,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id              TEXT PRIMARY KEY,
                conversation_id TEXT,
                prompt          TEXT NOT NULL,
                kind            TEXT NOT NULL,
                value           TEXT NOT NULL,
                status          TEXT NOT NULL,
                notify          INTEGER NOT NULL DEFAULT 1,
                next_run        TEXT,
                last_run        TEXT,
                last_result     TEXT,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("tasks table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(status, next_run)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(format!("tasks index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS task_runs (
                id          TEXT PRIMARY KEY,
                task_id     TEXT NOT NULL,
                started_at  TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                outcome     TEXT NOT NULL,
                output      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("task_runs table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_task_runs_task ON task_runs(task_id, started_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::MigrationFailed(format!("task_runs index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StorageError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StorageError::Backend(format!("id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StorageError::Backend(format!("role column: {e}")))?;
        let content: Option<String> = row
            .try_get("content")
            .map_err(|e| StorageError::Backend(format!("content column: {e}")))?;
        let tool_calls_json: String = row
            .try_get("tool_calls")
            .map_err(|e| StorageError::Backend(format!("tool_calls column: {e}")))?;
        let tool_call_id: Option<String> = row
            .try_get("tool_call_id")
            .map_err(|e| StorageError::Backend(format!("tool_call_id column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(format!("created_at column: {e}")))?;

        let role = match role_str.as_str() {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "tool" => Role::Tool,
            other => return Err(StorageError::Backend(format!("Unknown role '{other}'"))),
        };
        let tool_calls: Vec<ToolCall> = serde_json::from_str(&tool_calls_json).unwrap_or_default();

        Ok(Message {
            id,
            role,
            content,
            tool_calls,
            tool_call_id,
            created_at: ts_from_db(&created_at_str)?,
        })
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> Result<ScheduledTask, StorageError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StorageError::Backend(format!("id column: {e}")))?;
        let conversation_id: Option<String> = row
            .try_get("conversation_id")
            .map_err(|e| StorageError::Backend(format!("conversation_id column: {e}")))?;
        let prompt: String = row
            .try_get("prompt")
            .map_err(|e| StorageError::Backend(format!("prompt column: {e}")))?;
        let kind_str: String = row
            .try_get("kind")
            .map_err(|e| StorageError::Backend(format!("kind column: {e}")))?;
        let value: String = row
            .try_get("value")
            .map_err(|e| StorageError::Backend(format!("value column: {e}")))?;
        let status_str: String = row
            .try_get("status")
            .map_err(|e| StorageError::Backend(format!("status column: {e}")))?;
        let notify: i64 = row
            .try_get("notify")
            .map_err(|e| StorageError::Backend(format!("notify column: {e}")))?;
        let next_run: Option<String> = row
            .try_get("next_run")
            .map_err(|e| StorageError::Backend(format!("next_run column: {e}")))?;
        let last_run: Option<String> = row
            .try_get("last_run")
            .map_err(|e| StorageError::Backend(format!("last_run column: {e}")))?;
        let last_result: Option<String> = row
            .try_get("last_result")
            .map_err(|e| StorageError::Backend(format!("last_result column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(format!("created_at column: {e}")))?;

        let kind = ScheduleKind::parse(&kind_str)
            .ok_or_else(|| StorageError::Backend(format!("Unknown schedule kind '{kind_str}'")))?;
        let status = TaskStatus::parse(&status_str)
            .ok_or_else(|| StorageError::Backend(format!("Unknown task status '{status_str}'")))?;

        Ok(ScheduledTask {
            id,
            conversation_id: conversation_id.map(|s| ConversationId::from(&s)),
            prompt,
            kind,
            value,
            status,
            notify: notify != 0,
            next_run: next_run.as_deref().map(ts_from_db).transpose()?,
            last_run: last_run.as_deref().map(ts_from_db).transpose()?,
            last_result,
            created_at: ts_from_db(&created_at_str)?,
        })
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(&self) -> Result<Conversation, StorageError> {
        let conv = Conversation::new();
        sqlx::query("INSERT INTO conversations (id, created_at, updated_at) VALUES (?1, ?2, ?3)")
            .bind(conv.id.to_string())
            .bind(ts_to_db(conv.created_at))
            .bind(ts_to_db(conv.updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Insert conversation: {e}")))?;
        Ok(conv)
    }

    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        let row = sqlx::query("SELECT id, created_at, updated_at FROM conversations WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Select conversation: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: String = row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(format!("created_at column: {e}")))?;
        let updated_at: String = row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(format!("updated_at column: {e}")))?;

        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY iid ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Select messages: {e}")))?;

        let messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Conversation {
            id: id.clone(),
            messages,
            created_at: ts_from_db(&created_at)?,
            updated_at: ts_from_db(&updated_at)?,
        }))
    }

    async fn append_message(
        &self,
        id: &ConversationId,
        message: &Message,
    ) -> Result<(), StorageError> {
        let tool_calls_json = serde_json::to_string(&message.tool_calls)
            .map_err(|e| StorageError::Backend(format!("tool_calls serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, tool_calls, tool_call_id, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&message.id)
        .bind(id.to_string())
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(tool_calls_json)
        .bind(&message.tool_call_id)
        .bind(ts_to_db(message.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Insert message: {e}")))?;

        sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(ts_to_db(Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Touch conversation: {e}")))?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<Message>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY iid DESC LIMIT ?2",
        )
        .bind(id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Select recent messages: {e}")))?;

        let mut messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()?;
        messages.reverse(); // oldest first
        Ok(messages)
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn create_task(&self, task: &ScheduledTask) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, conversation_id, prompt, kind, value, status, notify,
                               next_run, last_run, last_result, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&task.id)
        .bind(task.conversation_id.as_ref().map(|c| c.to_string()))
        .bind(&task.prompt)
        .bind(task.kind.as_str())
        .bind(&task.value)
        .bind(task.status.as_str())
        .bind(task.notify as i64)
        .bind(task.next_run.map(ts_to_db))
        .bind(task.last_run.map(ts_to_db))
        .bind(&task.last_result)
        .bind(ts_to_db(task.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Insert task: {e}")))?;
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<ScheduledTask>, StorageError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Select task: {e}")))?;
        row.as_ref().map(Self::row_to_task).transpose()
    }

    async fn list_tasks(&self) -> Result<Vec<ScheduledTask>, StorageError> {
        let rows = sqlx::query("SELECT * FROM tasks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("List tasks: {e}")))?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn update_task(&self, task: &ScheduledTask) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks SET conversation_id = ?2, prompt = ?3, kind = ?4, value = ?5,
                             status = ?6, notify = ?7, next_run = ?8, last_run = ?9,
                             last_result = ?10
            WHERE id = ?1
            "#,
        )
        .bind(&task.id)
        .bind(task.conversation_id.as_ref().map(|c| c.to_string()))
        .bind(&task.prompt)
        .bind(task.kind.as_str())
        .bind(&task.value)
        .bind(task.status.as_str())
        .bind(task.notify as i64)
        .bind(task.next_run.map(ts_to_db))
        .bind(task.last_run.map(ts_to_db))
        .bind(&task.last_result)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Update task: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(task.id.clone()));
        }
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<bool, StorageError> {
        sqlx::query("DELETE FROM task_runs WHERE task_id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Delete task runs: {e}")))?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("Delete task: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn due_tasks(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTask>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE status = 'active' AND next_run IS NOT NULL AND next_run <= ?1
            ORDER BY next_run ASC
            "#,
        )
        .bind(ts_to_db(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Due tasks: {e}")))?;
        rows.iter().map(Self::row_to_task).collect()
    }

    async fn append_run(&self, log: &TaskRunLog) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO task_runs (id, task_id, started_at, duration_ms, outcome, output)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&log.id)
        .bind(&log.task_id)
        .bind(ts_to_db(log.started_at))
        .bind(log.duration_ms as i64)
        .bind(log.outcome.as_str())
        .bind(&log.output)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Insert run log: {e}")))?;
        Ok(())
    }

    async fn runs_for(
        &self,
        task_id: &str,
        limit: usize,
    ) -> Result<Vec<TaskRunLog>, StorageError> {
        let rows = sqlx::query(
            "SELECT * FROM task_runs WHERE task_id = ?1 ORDER BY started_at DESC LIMIT ?2",
        )
        .bind(task_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(format!("Select runs: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(|e| StorageError::Backend(format!("id column: {e}")))?;
                let task_id: String = row
                    .try_get("task_id")
                    .map_err(|e| StorageError::Backend(format!("task_id column: {e}")))?;
                let started_at: String = row
                    .try_get("started_at")
                    .map_err(|e| StorageError::Backend(format!("started_at column: {e}")))?;
                let duration_ms: i64 = row
                    .try_get("duration_ms")
                    .map_err(|e| StorageError::Backend(format!("duration_ms column: {e}")))?;
                let outcome_str: String = row
                    .try_get("outcome")
                    .map_err(|e| StorageError::Backend(format!("outcome column: {e}")))?;
                let output: String = row
                    .try_get("output")
                    .map_err(|e| StorageError::Backend(format!("output column: {e}")))?;

                Ok(TaskRunLog {
                    id,
                    task_id,
                    started_at: ts_from_db(&started_at)?,
                    duration_ms: duration_ms as u64,
                    outcome: RunOutcome::parse(&outcome_str).ok_or_else(|| {
                        StorageError::Backend(format!("Unknown outcome '{outcome_str}'"))
                    })?,
                    output,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valet_core::task::CreateTask;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::open(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    fn interval_task(value: &str) -> ScheduledTask {
        ScheduledTask::new(
            CreateTask {
                prompt: "Summarize the news".into(),
                kind: ScheduleKind::Interval,
                value: value.into(),
                notify: true,
                conversation_id: None,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn conversation_roundtrip_preserves_order() {
        let (_dir, store) = store().await;
        let conv = store.create_conversation().await.unwrap();

        store
            .append_message(&conv.id, &Message::user("first"))
            .await
            .unwrap();
        store
            .append_message(&conv.id, &Message::assistant("second"))
            .await
            .unwrap();
        store
            .append_message(&conv.id, &Message::user("third"))
            .await
            .unwrap();

        let loaded = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 3);
        assert_eq!(loaded.messages[0].text(), "first");
        assert_eq!(loaded.messages[2].text(), "third");
    }

    #[tokio::test]
    async fn message_tool_calls_survive_roundtrip() {
        let (_dir, store) = store().await;
        let conv = store.create_conversation().await.unwrap();

        let msg = Message::assistant_with_calls(
            None,
            vec![ToolCall {
                id: "call_1".into(),
                name: "web_search".into(),
                arguments: r#"{"query":"rust"}"#.into(),
            }],
        );
        store.append_message(&conv.id, &msg).await.unwrap();
        store
            .append_message(&conv.id, &Message::tool_result("call_1", "results"))
            .await
            .unwrap();

        let loaded = store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert!(loaded.messages[0].content.is_none());
        assert_eq!(loaded.messages[0].tool_calls[0].name, "web_search");
        assert_eq!(loaded.messages[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn recent_messages_window_is_oldest_first() {
        let (_dir, store) = store().await;
        let conv = store.create_conversation().await.unwrap();
        for i in 0..10 {
            store
                .append_message(&conv.id, &Message::user(format!("msg {i}")))
                .await
                .unwrap();
        }

        let recent = store.recent_messages(&conv.id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text(), "msg 7");
        assert_eq!(recent[2].text(), "msg 9");
    }

    #[tokio::test]
    async fn task_roundtrip() {
        let (_dir, store) = store().await;
        let task = interval_task("60000");
        store.create_task(&task).await.unwrap();

        let loaded = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.prompt, "Summarize the news");
        assert_eq!(loaded.kind, ScheduleKind::Interval);
        assert_eq!(loaded.status, TaskStatus::Active);
        assert!(loaded.notify);
    }

    #[tokio::test]
    async fn due_query_excludes_inactive_statuses() {
        let (_dir, store) = store().await;
        let past = Utc::now() - chrono::Duration::minutes(5);

        for status in [
            TaskStatus::Active,
            TaskStatus::Paused,
            TaskStatus::Completed,
            TaskStatus::Error,
        ] {
            let mut task = interval_task("60000");
            task.status = status;
            task.next_run = Some(past);
            store.create_task(&task).await.unwrap();
        }

        let due = store.due_tasks(Utc::now()).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn due_query_excludes_future_and_null_next_run() {
        let (_dir, store) = store().await;

        let mut future = interval_task("60000");
        future.next_run = Some(Utc::now() + chrono::Duration::hours(1));
        store.create_task(&future).await.unwrap();

        let mut no_next = interval_task("60000");
        no_next.next_run = None;
        store.create_task(&no_next).await.unwrap();

        let due = store.due_tasks(Utc::now()).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn update_task_persists_mutation() {
        let (_dir, store) = store().await;
        let mut task = interval_task("60000");
        store.create_task(&task).await.unwrap();

        task.status = TaskStatus::Paused;
        task.last_result = Some("done".into());
        store.update_task(&task).await.unwrap();

        let loaded = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TaskStatus::Paused);
        assert_eq!(loaded.last_result.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn update_missing_task_is_not_found() {
        let (_dir, store) = store().await;
        let task = interval_task("60000");
        let err = store.update_task(&task).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_task_and_runs() {
        let (_dir, store) = store().await;
        let task = interval_task("60000");
        store.create_task(&task).await.unwrap();
        store
            .append_run(&TaskRunLog::new(
                &task.id,
                Utc::now(),
                12,
                RunOutcome::Success,
                "ok",
            ))
            .await
            .unwrap();

        assert!(store.delete_task(&task.id).await.unwrap());
        assert!(store.get_task(&task.id).await.unwrap().is_none());
        assert!(store.runs_for(&task.id, 10).await.unwrap().is_empty());
        // Second delete is a no-op
        assert!(!store.delete_task(&task.id).await.unwrap());
    }

    #[tokio::test]
    async fn run_log_is_append_only_newest_first() {
        let (_dir, store) = store().await;
        let task = interval_task("60000");
        store.create_task(&task).await.unwrap();

        let t0 = Utc::now() - chrono::Duration::minutes(2);
        let t1 = Utc::now();
        store
            .append_run(&TaskRunLog::new(&task.id, t0, 5, RunOutcome::Error, "boom"))
            .await
            .unwrap();
        store
            .append_run(&TaskRunLog::new(&task.id, t1, 7, RunOutcome::Success, "ok"))
            .await
            .unwrap();

        let runs = store.runs_for(&task.id, 10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].outcome, RunOutcome::Success);
        assert_eq!(runs[1].outcome, RunOutcome::Error);
    }
}
