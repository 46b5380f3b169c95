//! `valet chat` — one streaming turn on the terminal.

use std::io::Write;
use tokio::sync::mpsc;
use valet_core::event::AssistantEvent;
use valet_core::message::ConversationId;

pub async fn run(message: &str, conversation: Option<String>) -> anyhow::Result<()> {
    let ctx = super::bootstrap().await?;

    let conversation_id = conversation.map(|id| ConversationId::from(&id));
    let (tx, mut rx) = mpsc::channel::<AssistantEvent>(256);

    let service = ctx.service.clone();
    let text = message.to_string();
    let turn = tokio::spawn(async move { service.chat(conversation_id, &text, tx).await });

    let mut stdout = std::io::stdout();
    let mut in_reasoning = false;
    while let Some(event) = rx.recv().await {
        match event {
            AssistantEvent::Token { text } => {
                if in_reasoning {
                    eprintln!();
                    in_reasoning = false;
                }
                print!("{text}");
                let _ = stdout.flush();
            }
            AssistantEvent::Reasoning { text } => {
                // Reasoning goes to stderr so piping stdout captures only
                // the answer
                eprint!("{text}");
                in_reasoning = true;
            }
            AssistantEvent::ToolStart { name, .. } => {
                if in_reasoning {
                    eprintln!();
                    in_reasoning = false;
                }
                eprintln!("⚙ {name} …");
            }
            AssistantEvent::ToolEnd { name, .. } => {
                eprintln!("⚙ {name} done");
            }
            AssistantEvent::Error { message } => {
                eprintln!("❌ {message}");
            }
            AssistantEvent::Done => break,
        }
    }
    println!();

    let conversation_id = turn.await??;
    eprintln!("(conversation {conversation_id})");
    Ok(())
}
