//! `valet daemon` — run the background scheduler until interrupted.

use std::sync::Arc;
use tracing::info;
use valet_scheduler::{Scheduler, TaskListener, TaskNotification};

/// Prints task completions to the terminal.
struct ConsoleListener;

impl TaskListener for ConsoleListener {
    fn notify(
        &self,
        notification: &TaskNotification,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        println!(
            "🔔 task {} (conversation {}): {}",
            notification.task_id, notification.conversation_id, notification.result
        );
        Ok(())
    }
}

pub async fn run() -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;

    if !ctx.config.scheduler.enabled {
        anyhow::bail!("Scheduler is disabled in config (scheduler.enabled = false)");
    }

    let tick = std::time::Duration::from_secs(ctx.config.scheduler.tick_secs);
    let scheduler = Arc::new(Scheduler::new(ctx.store.clone(), ctx.service.clone(), tick));
    scheduler.subscribe(Arc::new(ConsoleListener)).await;

    let tasks = ctx.tasks.list().await?;
    println!("🕰  Valet daemon — polling every {}s", tick.as_secs());
    println!("   Tasks: {}", tasks.len());

    let handle = scheduler.clone().start();
    info!("Daemon running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down…");
    handle.stop().await;

    Ok(())
}
