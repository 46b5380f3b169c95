//! Scheduled task domain types.
//!
//! A `ScheduledTask` is a deferred or recurring invocation of the assistant
//! engine: the scheduler polls for due tasks and re-enters the step executor
//! with the stored prompt. `TaskRunLog` is the append-only record of every
//! execution attempt, one row per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::ConversationId;

/// How a task's schedule value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Run once at an absolute RFC 3339 timestamp
    Once,
    /// Run every N milliseconds (value is the period as text)
    Interval,
    /// Run per a 5-field cron expression
    Cron,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Once => "once",
            ScheduleKind::Interval => "interval",
            ScheduleKind::Cron => "cron",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "once" => Some(ScheduleKind::Once),
            "interval" => Some(ScheduleKind::Interval),
            "cron" => Some(ScheduleKind::Cron),
            _ => None,
        }
    }
}

/// Task lifecycle status.
///
/// Only `Active` tasks are eligible for polling. `Error` keeps the schedule
/// parameters so the task can be resumed manually after inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Paused,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TaskStatus::Active),
            "paused" => Some(TaskStatus::Paused),
            "completed" => Some(TaskStatus::Completed),
            "error" => Some(TaskStatus::Error),
            _ => None,
        }
    }
}

/// A persisted deferred or recurring invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task ID
    pub id: String,

    /// The conversation runs append to; None until the first run of an
    /// orphan task creates one
    pub conversation_id: Option<ConversationId>,

    /// The prompt fed to the step executor on each run
    pub prompt: String,

    /// Schedule kind
    pub kind: ScheduleKind,

    /// Schedule value — timestamp, millisecond period, or cron expression,
    /// depending on `kind`
    pub value: String,

    /// Lifecycle status
    pub status: TaskStatus,

    /// Whether completion notifications fan out to listeners
    pub notify: bool,

    /// When this task is next eligible to run; None once terminal
    pub next_run: Option<DateTime<Utc>>,

    /// When this task last ran
    pub last_run: Option<DateTime<Utc>>,

    /// Truncated text of the last run's result or error
    pub last_result: Option<String>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Input for creating a [`ScheduledTask`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTask {
    pub prompt: String,
    pub kind: ScheduleKind,
    pub value: String,
    #[serde(default = "default_notify")]
    pub notify: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

fn default_notify() -> bool {
    true
}

impl ScheduledTask {
    /// Build a new active task from creation input and its computed first
    /// eligible time.
    pub fn new(input: CreateTask, next_run: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id: input.conversation_id,
            prompt: input.prompt,
            kind: input.kind,
            value: input.value,
            status: TaskStatus::Active,
            notify: input.notify,
            next_run: Some(next_run),
            last_run: None,
            last_result: None,
            created_at: Utc::now(),
        }
    }
}

/// The outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Success,
    Error,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Success => "success",
            RunOutcome::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(RunOutcome::Success),
            "error" => Some(RunOutcome::Error),
            _ => None,
        }
    }
}

/// One row of the append-only task run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunLog {
    pub id: String,
    pub task_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub outcome: RunOutcome,
    /// Truncated result or error text
    pub output: String,
}

impl TaskRunLog {
    pub fn new(
        task_id: impl Into<String>,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        outcome: RunOutcome,
        output: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            started_at,
            duration_ms,
            outcome,
            output: output.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_active_with_next_run() {
        let now = Utc::now();
        let task = ScheduledTask::new(
            CreateTask {
                prompt: "Summarize the news".into(),
                kind: ScheduleKind::Interval,
                value: "60000".into(),
                notify: true,
                conversation_id: None,
            },
            now,
        );
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.next_run, Some(now));
        assert!(task.last_run.is_none());
        assert!(task.conversation_id.is_none());
    }

    #[test]
    fn kind_and_status_roundtrip() {
        for kind in [ScheduleKind::Once, ScheduleKind::Interval, ScheduleKind::Cron] {
            assert_eq!(ScheduleKind::parse(kind.as_str()), Some(kind));
        }
        for status in [
            TaskStatus::Active,
            TaskStatus::Paused,
            TaskStatus::Completed,
            TaskStatus::Error,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert!(ScheduleKind::parse("hourly").is_none());
    }

    #[test]
    fn create_task_notify_defaults_true() {
        let input: CreateTask = serde_json::from_str(
            r#"{"prompt":"check mail","kind":"once","value":"2026-08-07T09:00:00Z"}"#,
        )
        .unwrap();
        assert!(input.notify);
        assert_eq!(input.kind, ScheduleKind::Once);
    }
}
