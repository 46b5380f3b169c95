//! Capability trait and registry — the abstraction over external actions.
//!
//! Capabilities are what give the assistant the ability to act in the world:
//! search the web, fetch pages, make HTTP calls, read/write the memory file,
//! schedule tasks. The registry is a closed set built once at startup; a
//! duplicate name is rejected at registration so wiring mistakes surface
//! early rather than at dispatch time.

use crate::error::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// A capability definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDefinition {
    /// The capability name (unique within the registry)
    pub name: String,

    /// Description of what the capability does
    pub description: String,

    /// JSON Schema describing the capability's parameters
    pub parameters: serde_json::Value,
}

/// The result of a successful capability execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityOutput {
    /// The output text fed back to the model
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CapabilityOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            data: None,
        }
    }
}

/// The outcome of a dispatch, fed back to the model as a tool result.
///
/// Dispatch never throws past the registry boundary: parse failures,
/// unknown names, and executor errors all arrive here as `success: false`
/// with the failure text in `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub success: bool,
    pub result: String,
}

impl DispatchOutcome {
    pub fn ok(result: impl Into<String>) -> Self {
        Self {
            success: true,
            result: result.into(),
        }
    }

    pub fn failed(result: impl Into<String>) -> Self {
        Self {
            success: false,
            result: result.into(),
        }
    }
}

/// The core Capability trait.
///
/// Each capability (web_search, browse_page, http_request, memory,
/// schedule_task) implements this trait. Executors own all side effects;
/// the registry itself is stateless beyond the name→executor mapping.
#[async_trait]
pub trait Capability: Send + Sync {
    /// The unique name of this capability (e.g., "web_search").
    fn name(&self) -> &str;

    /// A description of what this capability does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this capability's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the capability with parsed arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<CapabilityOutput, CapabilityError>;

    /// Convert this capability into a definition for the model call.
    fn to_definition(&self) -> CapabilityDefinition {
        CapabilityDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A closed registry of available capabilities.
///
/// The step executor uses this to:
/// 1. Get definitions to send to the model
/// 2. Dispatch capability calls when the model requests them
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Box<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    /// Register a capability. Duplicate names are an error: the set is
    /// validated once at startup, not mutated at runtime.
    pub fn register(
        &mut self,
        capability: Box<dyn Capability>,
    ) -> std::result::Result<(), CapabilityError> {
        let name = capability.name().to_string();
        if self.capabilities.contains_key(&name) {
            return Err(CapabilityError::AlreadyRegistered(name));
        }
        self.capabilities.insert(name, capability);
        Ok(())
    }

    /// Get a capability by name.
    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.capabilities.get(name).map(|c| c.as_ref())
    }

    /// Get all capability definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<CapabilityDefinition> {
        let mut defs: Vec<_> = self.capabilities.values().map(|c| c.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered capability names.
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    /// Dispatch a capability call with the raw argument string produced by
    /// the model.
    ///
    /// This is the error boundary of the tool loop: whatever goes wrong —
    /// malformed JSON, an unknown name, an executor failure — comes back as
    /// a failed `DispatchOutcome` that is fed to the model, never an `Err`.
    pub async fn dispatch(&self, name: &str, raw_arguments: &str) -> DispatchOutcome {
        let arguments: serde_json::Value = match serde_json::from_str(raw_arguments) {
            Ok(v) => v,
            Err(e) => {
                warn!(capability = %name, error = %e, "Malformed capability arguments");
                return DispatchOutcome::failed(format!(
                    "Error: invalid arguments for '{name}': {e}"
                ));
            }
        };

        let Some(capability) = self.capabilities.get(name) else {
            warn!(capability = %name, "Unknown capability requested");
            return DispatchOutcome::failed(format!("Error: unknown capability '{name}'"));
        };

        match capability.execute(arguments).await {
            Ok(output) => DispatchOutcome::ok(output.output),
            Err(e) => {
                warn!(capability = %name, error = %e, "Capability execution failed");
                DispatchOutcome::failed(format!("Error: {e}"))
            }
        }
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
