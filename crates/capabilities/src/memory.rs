//! Persistent memory capability — a file-backed notes store.
//!
//! The memory file is plain markdown the user can open and edit. `append`
//! adds a timestamped bullet; `read` returns the whole file. The system
//! prompt builder also reads this file directly, so remembered facts reach
//! the model on every turn.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::path::PathBuf;
use valet_core::capability::{Capability, CapabilityOutput};
use valet_core::error::CapabilityError;

pub struct MemoryCapability {
    path: PathBuf,
}

impl MemoryCapability {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MemoryAction {
    Read,
    Append,
}

#[derive(Debug, Deserialize)]
struct MemoryArgs {
    action: MemoryAction,
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl Capability for MemoryCapability {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Read or append to the persistent memory file. Use 'append' to remember a fact for \
         future conversations, 'read' to recall everything stored."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["read", "append"],
                    "description": "Whether to read the memory file or append to it"
                },
                "content": {
                    "type": "string",
                    "description": "The fact to remember (required for append)"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let args: MemoryArgs = serde_json::from_value(arguments)
            .map_err(|e| CapabilityError::InvalidArguments(e.to_string()))?;

        match args.action {
            MemoryAction::Read => {
                let content = match tokio::fs::read_to_string(&self.path).await {
                    Ok(text) => text,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        return Ok(CapabilityOutput::text("Memory is empty."));
                    }
                    Err(e) => {
                        return Err(CapabilityError::ExecutionFailed {
                            name: "memory".into(),
                            reason: format!("Read failed: {e}"),
                        });
                    }
                };
                Ok(CapabilityOutput::text(if content.trim().is_empty() {
                    "Memory is empty.".into()
                } else {
                    content
                }))
            }
            MemoryAction::Append => {
                let content = args.content.filter(|c| !c.trim().is_empty()).ok_or_else(|| {
                    CapabilityError::InvalidArguments(
                        "'content' is required for append".into(),
                    )
                })?;

                if let Some(parent) = self.path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        CapabilityError::ExecutionFailed {
                            name: "memory".into(),
                            reason: format!("Create dir failed: {e}"),
                        }
                    })?;
                }

                let existing = tokio::fs::read_to_string(&self.path)
                    .await
                    .unwrap_or_default();
                let entry = format!("- [{}] {}\n", Utc::now().format("%Y-%m-%d"), content.trim());
                tokio::fs::write(&self.path, format!("{existing}{entry}"))
                    .await
                    .map_err(|e| CapabilityError::ExecutionFailed {
                        name: "memory".into(),
                        reason: format!("Write failed: {e}"),
                    })?;

                Ok(CapabilityOutput::text("Remembered."))
            }
        }
    }
}
