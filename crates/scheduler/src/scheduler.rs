//! The background tick loop.
//!
//! Every tick polls the store for due tasks and re-enters the assistant
//! engine for each, one at a time. A non-reentrant guard skips overlapping
//! ticks rather than queueing them, so a slow run costs at most a polling
//! interval. One task's failure never aborts the tick or its siblings.
//!
//! The scheduler is an explicitly lifecycled service: construct it, call
//! [`Scheduler::start`] to spawn the loop, and [`SchedulerHandle::stop`]
//! to shut it down.

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};
use valet_core::event::TurnRunner;
use valet_core::message::ConversationId;
use valet_core::store::TaskStore;
use valet_core::task::{RunOutcome, ScheduleKind, ScheduledTask, TaskRunLog, TaskStatus};

use crate::schedule;

/// Result text kept on the task, in the run log, and in notifications.
const RESULT_TRUNCATE: usize = 400;

/// Payload fanned out to listeners after a notifying task's run.
#[derive(Debug, Clone)]
pub struct TaskNotification {
    pub task_id: String,
    pub conversation_id: ConversationId,
    /// Truncated result (or error) text
    pub result: String,
}

/// A task-completion listener.
///
/// Listener failures are logged and swallowed — one bad listener cannot
/// block the others or the scheduler.
pub trait TaskListener: Send + Sync {
    fn notify(
        &self,
        notification: &TaskNotification,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// The background scheduler service.
pub struct Scheduler {
    store: Arc<dyn TaskStore>,
    runner: Arc<dyn TurnRunner>,
    listeners: RwLock<Vec<Arc<dyn TaskListener>>>,
    ticking: AtomicBool,
    tick_period: std::time::Duration,
}

/// Handle to a started scheduler loop.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    join: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the loop to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn TaskStore>,
        runner: Arc<dyn TurnRunner>,
        tick_period: std::time::Duration,
    ) -> Self {
        Self {
            store,
            runner,
            listeners: RwLock::new(Vec::new()),
            ticking: AtomicBool::new(false),
            tick_period,
        }
    }

    /// Register a task-completion listener.
    pub async fn subscribe(&self, listener: Arc<dyn TaskListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Spawn the tick loop. The first tick fires one period after start.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let scheduler = self.clone();

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.tick_period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The immediate first tick of `interval` is consumed here so
            // ticks land one period apart.
            interval.tick().await;

            info!(period_secs = scheduler.tick_period.as_secs(), "Scheduler started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.tick().await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Scheduler stopped");
                            return;
                        }
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            join,
        }
    }

    /// Run one polling cycle. Public so callers (and tests) can drive the
    /// scheduler without the timer.
    pub async fn tick(&self) {
        // Overlapping ticks are skipped, never queued
        if self
            .ticking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Tick still in progress, skipping");
            return;
        }

        let now = Utc::now();
        match self.store.due_tasks(now).await {
            Ok(due) => {
                if !due.is_empty() {
                    debug!(count = due.len(), "Due tasks");
                }
                for task in due {
                    let task_id = task.id.clone();
                    if let Err(e) = self.run_task(task).await {
                        warn!(task_id = %task_id, error = %e, "Task bookkeeping failed");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Due-task query failed"),
        }

        self.ticking.store(false, Ordering::SeqCst);
    }

    /// Execute one due task and record the outcome.
    ///
    /// The returned error covers bookkeeping (store writes) only; an
    /// executor failure is absorbed into the task's `error` status.
    async fn run_task(&self, mut task: ScheduledTask) -> Result<(), valet_core::Error> {
        let started = Utc::now();
        let timer = std::time::Instant::now();

        debug!(task_id = %task.id, "Running scheduled task");
        let run = self
            .runner
            .run_turn(task.conversation_id.clone(), &task.prompt)
            .await;
        let duration_ms = timer.elapsed().as_millis() as u64;

        let (outcome, text) = match run {
            Ok(output) => {
                // An orphan task adopts the conversation its first run created
                task.conversation_id = Some(output.conversation_id);
                (RunOutcome::Success, truncate(&output.answer, RESULT_TRUNCATE))
            }
            Err(e) => (RunOutcome::Error, truncate(&e.to_string(), RESULT_TRUNCATE)),
        };

        // The run log is appended regardless of outcome
        self.store
            .append_run(&TaskRunLog::new(&task.id, started, duration_ms, outcome, &text))
            .await?;

        task.last_run = Some(started);
        task.last_result = Some(text.clone());
        task.next_run = schedule::next_run_after(task.kind, &task.value, Utc::now(), self.tick_period);
        task.status = match (outcome, task.kind) {
            (RunOutcome::Error, _) => TaskStatus::Error,
            (RunOutcome::Success, ScheduleKind::Once) => TaskStatus::Completed,
            (RunOutcome::Success, _) => TaskStatus::Active,
        };

        self.store.update_task(&task).await?;
        info!(
            task_id = %task.id,
            outcome = outcome.as_str(),
            status = task.status.as_str(),
            next_run = ?task.next_run,
            "Task run recorded"
        );

        if task.notify
            && let Some(conversation_id) = task.conversation_id.clone()
        {
            self.fan_out(TaskNotification {
                task_id: task.id.clone(),
                conversation_id,
                result: text,
            })
            .await;
        }

        Ok(())
    }

    async fn fan_out(&self, notification: TaskNotification) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            if let Err(e) = listener.notify(&notification) {
                warn!(task_id = %notification.task_id, error = %e, "Task listener failed");
            }
        }
    }
}

/// Truncate on a char boundary, appending an ellipsis when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use valet_core::error::{Error, ProviderError};
    use valet_core::event::TurnOutput;
    use valet_core::store::ConversationStore;
    use valet_core::task::CreateTask;
    use valet_storage::InMemoryStore;

    /// A runner that returns a fixed answer, or fails when told to.
    struct MockRunner {
        store: Arc<InMemoryStore>,
        answer: String,
        fail: bool,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl TurnRunner for MockRunner {
        async fn run_turn(
            &self,
            conversation_id: Option<ConversationId>,
            _prompt: &str,
        ) -> Result<TurnOutput, Error> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                return Err(ProviderError::Network("connection refused".into()).into());
            }
            let conversation_id = match conversation_id {
                Some(id) => id,
                None => self.store.create_conversation().await?.id,
            };
            Ok(TurnOutput {
                conversation_id,
                answer: self.answer.clone(),
            })
        }
    }

    struct RecordingListener {
        seen: Mutex<Vec<TaskNotification>>,
    }

    impl TaskListener for RecordingListener {
        fn notify(
            &self,
            notification: &TaskNotification,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.seen.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct FailingListener;

    impl TaskListener for FailingListener {
        fn notify(
            &self,
            _notification: &TaskNotification,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("listener exploded".into())
        }
    }

    const TICK: std::time::Duration = std::time::Duration::from_secs(15);

    fn setup(fail: bool) -> (Arc<InMemoryStore>, Arc<Scheduler>) {
        let store = Arc::new(InMemoryStore::new());
        let runner = Arc::new(MockRunner {
            store: store.clone(),
            answer: "All done.".into(),
            fail,
            calls: Mutex::new(0),
        });
        let scheduler = Arc::new(Scheduler::new(store.clone(), runner, TICK));
        (store, scheduler)
    }

    async fn due_task(store: &InMemoryStore, kind: ScheduleKind, value: &str) -> ScheduledTask {
        let mut task = ScheduledTask::new(
            CreateTask {
                prompt: "Do the thing".into(),
                kind,
                value: value.into(),
                notify: true,
                conversation_id: None,
            },
            Utc::now() - chrono::Duration::seconds(1),
        );
        task.next_run = Some(Utc::now() - chrono::Duration::seconds(1));
        store.create_task(&task).await.unwrap();
        task
    }

    #[tokio::test]
    async fn once_task_completes_after_one_run() {
        let (store, scheduler) = setup(false);
        let task = due_task(&store, ScheduleKind::Once, "2026-01-01T00:00:00Z").await;

        scheduler.tick().await;

        let task = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.next_run.is_none());
        assert!(task.last_run.is_some());
        assert_eq!(task.last_result.as_deref(), Some("All done."));
        // A conversation was created and written back
        assert!(task.conversation_id.is_some());

        let runs = store.runs_for(&task.id, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, RunOutcome::Success);
    }

    #[tokio::test]
    async fn interval_task_reschedules() {
        let (store, scheduler) = setup(false);
        let task = due_task(&store, ScheduleKind::Interval, "60000").await;

        let before = Utc::now();
        scheduler.tick().await;

        let task = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Active);
        let next = task.next_run.unwrap();
        // next_run lands within polling tolerance of now + 60s
        assert!(next >= before + chrono::Duration::milliseconds(60000));
        assert!(next <= Utc::now() + chrono::Duration::milliseconds(61000));
    }

    #[tokio::test]
    async fn failed_run_sets_error_status_and_still_logs() {
        let (store, scheduler) = setup(true);
        let task = due_task(&store, ScheduleKind::Interval, "60000").await;

        scheduler.tick().await;

        let task = store.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Error);
        assert!(task.last_result.unwrap().contains("connection refused"));

        let runs = store.runs_for(&task.id, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].outcome, RunOutcome::Error);

        // Errored tasks are no longer polled
        scheduler.tick().await;
        let runs = store.runs_for(&task.id, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[tokio::test]
    async fn one_failing_task_does_not_block_siblings() {
        let store = Arc::new(InMemoryStore::new());
        let runner = Arc::new(MockRunner {
            store: store.clone(),
            answer: "ok".into(),
            fail: false,
            calls: Mutex::new(0),
        });
        let scheduler = Arc::new(Scheduler::new(store.clone(), runner.clone(), TICK));

        let a = due_task(&store, ScheduleKind::Interval, "garbage-value").await;
        let b = due_task(&store, ScheduleKind::Interval, "60000").await;

        scheduler.tick().await;

        // Both tasks ran despite task A's corrupt schedule value
        assert_eq!(*runner.calls.lock().unwrap(), 2);
        let a = store.get_task(&a.id).await.unwrap().unwrap();
        let b = store.get_task(&b.id).await.unwrap().unwrap();
        // The corrupt value degrades to one tick ahead, not a crash
        assert!(a.next_run.is_some());
        assert_eq!(b.status, TaskStatus::Active);
    }

    #[tokio::test]
    async fn notifications_fan_out_and_swallow_failures() {
        let (store, scheduler) = setup(false);
        let recording = Arc::new(RecordingListener {
            seen: Mutex::new(Vec::new()),
        });
        scheduler.subscribe(Arc::new(FailingListener)).await;
        scheduler.subscribe(recording.clone()).await;

        let task = due_task(&store, ScheduleKind::Once, "2026-01-01T00:00:00Z").await;
        scheduler.tick().await;

        // The failing listener did not block the recording one
        let seen = recording.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].task_id, task.id);
        assert_eq!(seen[0].result, "All done.");
    }

    #[tokio::test]
    async fn notify_false_suppresses_fan_out() {
        let (store, scheduler) = setup(false);
        let recording = Arc::new(RecordingListener {
            seen: Mutex::new(Vec::new()),
        });
        scheduler.subscribe(recording.clone()).await;

        let mut task = due_task(&store, ScheduleKind::Once, "2026-01-01T00:00:00Z").await;
        task.notify = false;
        store.update_task(&task).await.unwrap();

        scheduler.tick().await;
        assert!(recording.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_and_stop_lifecycle() {
        let (_store, scheduler) = setup(false);
        let handle = scheduler.start();
        handle.stop().await;
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 400), "short");
        let long = "é".repeat(300);
        let cut = truncate(&long, 401);
        assert!(cut.ends_with('…'));
        assert!(cut.len() <= 404);
    }
}
