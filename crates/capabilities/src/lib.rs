//! Built-in capability implementations for Valet.
//!
//! Capabilities give the assistant the ability to act in the world: search
//! the web, read pages, call HTTP APIs, keep persistent notes, and schedule
//! future work. Search, browse, and HTTP are deterministic stubs — their
//! production transports are collaborator concerns — while memory and
//! schedule_task are fully wired.

pub mod browse_page;
pub mod http_request;
pub mod memory;
pub mod schedule_task;
pub mod web_search;

use std::path::PathBuf;
use valet_core::capability::CapabilityRegistry;
use valet_core::error::CapabilityError;
use valet_scheduler::TaskService;

pub use browse_page::BrowsePageCapability;
pub use http_request::HttpRequestCapability;
pub use memory::MemoryCapability;
pub use schedule_task::ScheduleTaskCapability;
pub use web_search::WebSearchCapability;

/// Build the default registry with all built-in capabilities.
///
/// The set is closed at startup; a duplicate registration here is a
/// programming error and surfaces immediately.
pub fn default_registry(
    memory_file: PathBuf,
    tasks: TaskService,
) -> Result<CapabilityRegistry, CapabilityError> {
    let mut registry = CapabilityRegistry::new();
    registry.register(Box::new(WebSearchCapability))?;
    registry.register(Box::new(BrowsePageCapability))?;
    registry.register(Box::new(HttpRequestCapability))?;
    registry.register(Box::new(MemoryCapability::new(memory_file)))?;
    registry.register(Box::new(ScheduleTaskCapability::new(tasks)))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use valet_storage::InMemoryStore;

    #[tokio::test]
    async fn default_registry_has_all_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = TaskService::new(
            Arc::new(InMemoryStore::new()),
            std::time::Duration::from_secs(15),
        );
        let registry = default_registry(dir.path().join("memory.md"), tasks).unwrap();

        let mut names: Vec<_> = registry.names();
        names.sort();
        assert_eq!(
            names,
            vec![
                "browse_page",
                "http_request",
                "memory",
                "schedule_task",
                "web_search"
            ]
        );
    }
}
