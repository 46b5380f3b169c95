//! `valet task` — manage scheduled tasks.

use valet_core::task::{CreateTask, ScheduleKind};

pub async fn add(prompt: &str, kind: &str, value: &str, notify: bool) -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;

    let Some(kind) = ScheduleKind::parse(kind) else {
        println!("❌ Unknown schedule kind '{kind}'. Expected: once, interval, or cron.");
        println!("   once     — RFC 3339 timestamp, e.g. 2026-08-07T09:00:00Z");
        println!("   interval — period in milliseconds, e.g. 3600000");
        println!("   cron     — 5-field expression, e.g. \"0 9 * * 1-5\"");
        return Ok(());
    };

    let task = ctx
        .tasks
        .create(CreateTask {
            prompt: prompt.to_string(),
            kind,
            value: value.to_string(),
            notify,
            conversation_id: None,
        })
        .await?;

    println!("✅ Task {} created", task.id);
    if let Some(next) = task.next_run {
        println!("   First run: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

pub async fn list() -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;
    let tasks = ctx.tasks.list().await?;

    if tasks.is_empty() {
        println!("📋 No tasks.");
        println!();
        println!("   Add one with:");
        println!("   valet task add \"Summarize my day\" --kind cron --value \"0 18 * * *\"");
        return Ok(());
    }

    println!("📋 Tasks ({}):", tasks.len());
    println!("{:-<78}", "");
    for task in tasks {
        let status = match task.status {
            valet_core::task::TaskStatus::Active => "✅",
            valet_core::task::TaskStatus::Paused => "⏸️ ",
            valet_core::task::TaskStatus::Completed => "✔ ",
            valet_core::task::TaskStatus::Error => "❌",
        };
        let next = task
            .next_run
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "—".into());
        println!(
            "  {status} {}  [{} {}]  next: {next}",
            task.id,
            task.kind.as_str(),
            task.value
        );
        println!("      {}", task.prompt);
        if let Some(result) = &task.last_result {
            println!("      last: {result}");
        }
    }
    Ok(())
}

pub async fn pause(id: &str) -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;
    ctx.tasks.pause(id).await?;
    println!("⏸️  Task {id} paused");
    Ok(())
}

pub async fn resume(id: &str) -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;
    let task = ctx.tasks.resume(id).await?;
    println!("▶️  Task {id} resumed");
    if let Some(next) = task.next_run {
        println!("   Next run: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

pub async fn cancel(id: &str) -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;
    if ctx.tasks.cancel(id).await? {
        println!("🗑  Task {id} deleted (run log included)");
    } else {
        println!("❌ No task with id {id}");
    }
    Ok(())
}

pub async fn run_now(id: &str) -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;
    ctx.tasks.run_now(id).await?;
    println!("⏩ Task {id} is due — it will run on the next scheduler tick");
    Ok(())
}

pub async fn runs(id: &str, limit: usize) -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;
    let runs = ctx.tasks.runs(id, limit).await?;

    if runs.is_empty() {
        println!("📋 No runs recorded for task {id}");
        return Ok(());
    }

    println!("📋 Last {} run(s) of {id}:", runs.len());
    for run in runs {
        let mark = match run.outcome {
            valet_core::task::RunOutcome::Success => "✅",
            valet_core::task::RunOutcome::Error => "❌",
        };
        println!(
            "  {mark} {}  ({} ms)",
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.duration_ms
        );
        println!("      {}", run.output);
    }
    Ok(())
}
