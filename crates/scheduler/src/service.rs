//! Interactive task operations: create, list, pause, resume, cancel,
//! run-now, and run-log inspection.
//!
//! These writes are not serialized against a running tick — a task already
//! picked up by a tick may still complete after being paused mid-flight.
//! Pause only affects future eligibility.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use valet_core::error::{Error, SchedulerError};
use valet_core::store::TaskStore;
use valet_core::task::{CreateTask, ScheduledTask, TaskRunLog, TaskStatus};

use crate::schedule;

/// Interactive surface over the task store.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn TaskStore>,
    tick: std::time::Duration,
}

impl TaskService {
    pub fn new(store: Arc<dyn TaskStore>, tick: std::time::Duration) -> Self {
        Self { store, tick }
    }

    /// Validate the schedule, compute the first eligible time, and persist
    /// the task as `active`.
    pub async fn create(&self, input: CreateTask) -> Result<ScheduledTask, Error> {
        let next_run = schedule::initial_next_run(input.kind, &input.value, Utc::now())?;
        let task = ScheduledTask::new(input, next_run);
        self.store.create_task(&task).await?;
        info!(task_id = %task.id, kind = task.kind.as_str(), next_run = %next_run, "Task created");
        Ok(task)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ScheduledTask>, Error> {
        Ok(self.store.get_task(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<ScheduledTask>, Error> {
        Ok(self.store.list_tasks().await?)
    }

    /// Pause an active task. Schedule parameters are kept.
    pub async fn pause(&self, id: &str) -> Result<ScheduledTask, Error> {
        let mut task = self.require(id).await?;
        if task.status != TaskStatus::Active {
            return Err(SchedulerError::RunFailed(format!(
                "Task {id} is {}, only active tasks can be paused",
                task.status.as_str()
            ))
            .into());
        }
        task.status = TaskStatus::Paused;
        self.store.update_task(&task).await?;
        info!(task_id = %id, "Task paused");
        Ok(task)
    }

    /// Resume a paused or errored task, recomputing its next eligible time.
    pub async fn resume(&self, id: &str) -> Result<ScheduledTask, Error> {
        let mut task = self.require(id).await?;
        if !matches!(task.status, TaskStatus::Paused | TaskStatus::Error) {
            return Err(SchedulerError::RunFailed(format!(
                "Task {id} is {}, only paused or errored tasks can be resumed",
                task.status.as_str()
            ))
            .into());
        }
        task.status = TaskStatus::Active;
        task.next_run = schedule::next_run_after(task.kind, &task.value, Utc::now(), self.tick)
            // a resumed `once` task fires on the next tick
            .or_else(|| Some(Utc::now()));
        self.store.update_task(&task).await?;
        info!(task_id = %id, next_run = ?task.next_run, "Task resumed");
        Ok(task)
    }

    /// Delete a task and its run log. Immediate and irreversible.
    pub async fn cancel(&self, id: &str) -> Result<bool, Error> {
        let removed = self.store.delete_task(id).await?;
        if removed {
            info!(task_id = %id, "Task cancelled");
        }
        Ok(removed)
    }

    /// Make an active task due immediately; it fires on the next tick.
    pub async fn run_now(&self, id: &str) -> Result<ScheduledTask, Error> {
        let mut task = self.require(id).await?;
        task.next_run = Some(Utc::now());
        self.store.update_task(&task).await?;
        Ok(task)
    }

    /// The most recent run-log rows, newest first.
    pub async fn runs(&self, id: &str, limit: usize) -> Result<Vec<TaskRunLog>, Error> {
        Ok(self.store.runs_for(id, limit).await?)
    }

    async fn require(&self, id: &str) -> Result<ScheduledTask, Error> {
        self.store
            .get_task(id)
            .await?
            .ok_or_else(|| SchedulerError::TaskNotFound(id.to_string()).into())
    }
}
