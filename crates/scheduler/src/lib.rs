//! Task scheduling for Valet — persisted deferred and recurring
//! invocations of the assistant engine.
//!
//! Three pieces:
//! - [`schedule`] — schedule value parsing and next-run computation,
//!   including the 5-field cron parser
//! - [`TaskService`] — the interactive surface (create/pause/resume/
//!   cancel/run-now)
//! - [`Scheduler`] — the background tick loop that polls due tasks,
//!   re-enters the engine, logs every run, and fans out notifications

pub mod schedule;
pub mod scheduler;
pub mod service;

pub use schedule::CronExpr;
pub use scheduler::{Scheduler, SchedulerHandle, TaskListener, TaskNotification};
pub use service::TaskService;
