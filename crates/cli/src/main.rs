//! Valet CLI — the main entry point.
//!
//! Commands:
//! - `chat`   — Send one message and stream the reply
//! - `daemon` — Start the background scheduler
//! - `task`   — Manage scheduled tasks

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "valet",
    about = "Valet — a personal assistant that plans, calls tools, and schedules follow-ups",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to the assistant and stream the reply
    Chat {
        /// The message text
        message: String,

        /// Continue an existing conversation by id
        #[arg(short, long)]
        conversation: Option<String>,
    },

    /// Start the background scheduler and keep running
    Daemon,

    /// Manage scheduled tasks
    Task {
        #[command(subcommand)]
        action: TaskCommands,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a scheduled task
    Add {
        /// The prompt to run when the task fires
        prompt: String,

        /// Schedule kind: once, interval, or cron
        #[arg(short, long)]
        kind: String,

        /// Schedule value: RFC 3339 timestamp, milliseconds, or cron expression
        #[arg(long)]
        value: String,

        /// Suppress completion notifications
        #[arg(long)]
        no_notify: bool,
    },

    /// List all tasks
    List,

    /// Pause an active task
    Pause { id: String },

    /// Resume a paused or errored task
    Resume { id: String },

    /// Delete a task and its run log
    Cancel { id: String },

    /// Make a task due on the next tick
    RunNow { id: String },

    /// Show a task's recent runs
    Runs {
        id: String,

        /// How many runs to show
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            conversation,
        } => commands::chat::run(&message, conversation).await?,
        Commands::Daemon => commands::daemon::run().await?,
        Commands::Task { action } => match action {
            TaskCommands::Add {
                prompt,
                kind,
                value,
                no_notify,
            } => commands::task::add(&prompt, &kind, &value, !no_notify).await?,
            TaskCommands::List => commands::task::list().await?,
            TaskCommands::Pause { id } => commands::task::pause(&id).await?,
            TaskCommands::Resume { id } => commands::task::resume(&id).await?,
            TaskCommands::Cancel { id } => commands::task::cancel(&id).await?,
            TaskCommands::RunNow { id } => commands::task::run_now(&id).await?,
            TaskCommands::Runs { id, limit } => commands::task::runs(&id, limit).await?,
        },
    }

    Ok(())
}
