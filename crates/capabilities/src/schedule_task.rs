//! Task scheduling capability — lets the model create deferred and
//! recurring tasks through the same [`TaskService`] the CLI uses.
//!
//! This is the one capability with a real write path: a successful call
//! persists a task the scheduler will pick up on a later tick.

use async_trait::async_trait;
use serde::Deserialize;
use valet_core::capability::{Capability, CapabilityOutput};
use valet_core::error::CapabilityError;
use valet_core::task::{CreateTask, ScheduleKind};
use valet_scheduler::TaskService;

pub struct ScheduleTaskCapability {
    tasks: TaskService,
}

impl ScheduleTaskCapability {
    pub fn new(tasks: TaskService) -> Self {
        Self { tasks }
    }
}

#[derive(Debug, Deserialize)]
struct ScheduleTaskArgs {
    prompt: String,
    kind: String,
    value: String,
    #[serde(default = "default_notify")]
    notify: bool,
}

fn default_notify() -> bool {
    true
}

#[async_trait]
impl Capability for ScheduleTaskCapability {
    fn name(&self) -> &str {
        "schedule_task"
    }

    fn description(&self) -> &str {
        "Schedule a prompt to run later or repeatedly. kind 'once' takes an RFC 3339 timestamp, \
         'interval' a period in milliseconds, 'cron' a 5-field cron expression."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "prompt": {
                    "type": "string",
                    "description": "What the assistant should do when the task fires"
                },
                "kind": {
                    "type": "string",
                    "enum": ["once", "interval", "cron"],
                    "description": "Schedule kind"
                },
                "value": {
                    "type": "string",
                    "description": "Timestamp, millisecond period, or cron expression, per kind"
                },
                "notify": {
                    "type": "boolean",
                    "description": "Whether to notify when a run completes (default true)",
                    "default": true
                }
            },
            "required": ["prompt", "kind", "value"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let args: ScheduleTaskArgs = serde_json::from_value(arguments)
            .map_err(|e| CapabilityError::InvalidArguments(e.to_string()))?;

        let kind = ScheduleKind::parse(&args.kind).ok_or_else(|| {
            CapabilityError::InvalidArguments(format!(
                "Unknown schedule kind '{}': expected once, interval, or cron",
                args.kind
            ))
        })?;

        let task = self
            .tasks
            .create(CreateTask {
                prompt: args.prompt,
                kind,
                value: args.value,
                notify: args.notify,
                conversation_id: None,
            })
            .await
            .map_err(|e| CapabilityError::ExecutionFailed {
                name: "schedule_task".into(),
                reason: e.to_string(),
            })?;

        let next = task
            .next_run
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "unscheduled".into());
        Ok(CapabilityOutput::text(format!(
            "Task {} scheduled ({}), first run at {}",
            task.id,
            task.kind.as_str(),
            next
        )))
    }
}
