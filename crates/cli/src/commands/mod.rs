//! CLI command implementations and shared bootstrap.

pub mod chat;
pub mod daemon;
pub mod task;

use anyhow::Context;
use std::sync::Arc;
use valet_agent::AssistantService;
use valet_config::AppConfig;
use valet_provider::OpenAiClient;
use valet_scheduler::TaskService;
use valet_storage::SqliteStore;

/// Everything a command needs, constructed once.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub tasks: TaskService,
    pub service: Arc<AssistantService>,
}

/// Load config and wire the engine together.
pub async fn bootstrap() -> anyhow::Result<AppContext> {
    let config = AppConfig::load().context("Failed to load config")?;

    if let Some(parent) = config.storage.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let db_path = config.storage.database.display().to_string();
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .await
            .with_context(|| format!("Failed to open database at {db_path}"))?,
    );

    let tick = std::time::Duration::from_secs(config.scheduler.tick_secs);
    let tasks = TaskService::new(store.clone(), tick);

    let registry = Arc::new(
        valet_capabilities::default_registry(config.assistant.memory_file.clone(), tasks.clone())
            .context("Failed to build capability registry")?,
    );

    let api_key = config.provider.api_key.clone().unwrap_or_default();
    let client = Arc::new(
        OpenAiClient::new("openai-compat", &config.provider.base_url, api_key)
            .context("Failed to build model client")?,
    );

    let service = Arc::new(
        AssistantService::new(
            client,
            registry,
            store.clone(),
            &config.provider.model,
            config.provider.temperature,
        )
        .with_identity(&config.assistant.identity)
        .with_memory_file(config.assistant.memory_file.clone())
        .with_max_tokens(config.provider.max_tokens),
    );

    Ok(AppContext {
        config,
        store,
        tasks,
        service,
    })
}
