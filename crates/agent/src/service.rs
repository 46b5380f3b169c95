//! The assistant service — Valet's three-stage pipeline.
//!
//! A turn flows Router → Planner → Step Executor: classify the request,
//! plan when the category warrants it, then run either each plan step or
//! one direct execution against the conversation. Streaming callers get
//! the full event feed; the scheduler re-enters through the non-streaming
//! [`TurnRunner`] implementation.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use valet_core::capability::CapabilityRegistry;
use valet_core::error::Error;
use valet_core::event::{AssistantEvent, TurnOutput, TurnRunner};
use valet_core::message::ConversationId;
use valet_core::model::ModelClient;
use valet_core::store::ConversationStore;

use crate::executor::{RunOptions, StepExecutor};
use crate::planner::{Plan, Planner};
use crate::router::{Intent, classify};

/// How much of the memory file is replayed into the system prompt.
const MEMORY_EXCERPT_CHARS: usize = 2000;

/// The assistant engine entry point.
pub struct AssistantService {
    executor: StepExecutor,
    planner: Planner,
    store: Arc<dyn ConversationStore>,
    registry: Arc<CapabilityRegistry>,
    identity: String,
    memory_file: Option<PathBuf>,
}

impl AssistantService {
    pub fn new(
        client: Arc<dyn ModelClient>,
        registry: Arc<CapabilityRegistry>,
        store: Arc<dyn ConversationStore>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        let model = model.into();
        Self {
            executor: StepExecutor::new(
                client.clone(),
                registry.clone(),
                store.clone(),
                &model,
                temperature,
            ),
            planner: Planner::new(client, &model, temperature),
            store,
            registry,
            identity: "You are Valet, a careful personal assistant.".into(),
            memory_file: None,
        }
    }

    /// Set the identity block of the system prompt.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Replay an excerpt of this memory file into every system prompt.
    pub fn with_memory_file(mut self, path: PathBuf) -> Self {
        self.memory_file = Some(path);
        self
    }

    /// Set the default max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.executor = self.executor.with_max_tokens(max);
        self
    }

    /// Run one full streaming turn: classify, maybe plan, execute.
    ///
    /// Chat-facing failures never propagate — they surface as one `Error`
    /// event — and the feed always terminates with `Done`.
    pub async fn chat(
        &self,
        conversation_id: Option<ConversationId>,
        text: &str,
        events: mpsc::Sender<AssistantEvent>,
    ) -> Result<ConversationId, Error> {
        let conversation_id = self.resolve_conversation(conversation_id).await?;

        if let Err(e) = self.run_pipeline(&conversation_id, text, &events).await {
            warn!(conversation_id = %conversation_id, error = %e, "Turn failed");
            let _ = events
                .send(AssistantEvent::Error {
                    message: e.to_string(),
                })
                .await;
        }
        let _ = events.send(AssistantEvent::Done).await;

        Ok(conversation_id)
    }

    async fn run_pipeline(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        events: &mpsc::Sender<AssistantEvent>,
    ) -> Result<(), Error> {
        let intent = classify(text);
        info!(conversation_id = %conversation_id, intent = intent.as_str(), "Turn classified");

        let plan = if intent == Intent::SimpleQa {
            None
        } else {
            self.planner.plan(text, intent, Some(events)).await
        };

        let system_prompt = self.system_prompt().await;

        match plan {
            Some(plan) => {
                self.run_plan(conversation_id, text, &system_prompt, plan, events)
                    .await
            }
            None => {
                self.executor
                    .run(
                        conversation_id,
                        &system_prompt,
                        text,
                        RunOptions {
                            record_user_message: true,
                            step_focus: None,
                            events: Some(events.clone()),
                        },
                    )
                    .await?;
                Ok(())
            }
        }
    }

    /// Run plan steps sequentially against the one conversation. The user
    /// message is recorded by the first step only; a transport-failed step
    /// is retried exactly once, then skipped so the rest of the plan still
    /// runs.
    async fn run_plan(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        system_prompt: &str,
        plan: Plan,
        events: &mpsc::Sender<AssistantEvent>,
    ) -> Result<(), Error> {
        let total = plan.steps.len();
        info!(conversation_id = %conversation_id, steps = total, "Executing plan");

        let mut record_user_message = true;
        for step in plan.steps {
            let focus = format!(
                "Step {} of {}: {} ({}) — {}",
                step.id,
                total,
                step.title,
                serde_json::to_string(&step.action)
                    .unwrap_or_default()
                    .trim_matches('"'),
                step.description
            );

            let mut result = self
                .executor
                .run(
                    conversation_id,
                    system_prompt,
                    text,
                    RunOptions {
                        record_user_message,
                        step_focus: Some(focus.clone()),
                        events: Some(events.clone()),
                    },
                )
                .await;

            if let Err(e) = &result {
                warn!(step = step.id, error = %e, "Step failed, retrying once");
                result = self
                    .executor
                    .run(
                        conversation_id,
                        system_prompt,
                        text,
                        RunOptions {
                            record_user_message: false,
                            step_focus: Some(focus),
                            events: Some(events.clone()),
                        },
                    )
                    .await;
            }

            if let Err(e) = result {
                warn!(step = step.id, error = %e, "Step failed after retry, moving on");
                let _ = events
                    .send(AssistantEvent::Error {
                        message: format!("Step {} failed: {e}", step.id),
                    })
                    .await;
            }

            record_user_message = false;
        }
        Ok(())
    }

    async fn resolve_conversation(
        &self,
        conversation_id: Option<ConversationId>,
    ) -> Result<ConversationId, Error> {
        match conversation_id {
            Some(id) => match self.store.get_conversation(&id).await? {
                Some(_) => Ok(id),
                None => Ok(self.store.create_conversation().await?.id),
            },
            None => Ok(self.store.create_conversation().await?.id),
        }
    }

    /// Assemble the system prompt: identity, capability catalogue, and a
    /// memory-file excerpt.
    async fn system_prompt(&self) -> String {
        let mut prompt = self.identity.clone();

        prompt.push_str("\n\n## Capabilities\n");
        for def in self.registry.definitions() {
            prompt.push_str(&format!("- {}: {}\n", def.name, def.description));
        }

        if let Some(path) = &self.memory_file
            && let Ok(memory) = tokio::fs::read_to_string(path).await
        {
            let memory = memory.trim();
            if !memory.is_empty() {
                let excerpt: String = memory.chars().take(MEMORY_EXCERPT_CHARS).collect();
                prompt.push_str("\n\n## Memory\n");
                prompt.push_str(&excerpt);
            }
        }

        prompt
    }
}

#[async_trait]
impl TurnRunner for AssistantService {
    /// One non-streaming direct turn — the scheduler's entry point.
    async fn run_turn(
        &self,
        conversation_id: Option<ConversationId>,
        prompt: &str,
    ) -> Result<TurnOutput, Error> {
        let conversation_id = self.resolve_conversation(conversation_id).await?;
        let system_prompt = self.system_prompt().await;

        let answer = self
            .executor
            .run(&conversation_id, &system_prompt, prompt, RunOptions::default())
            .await?;

        Ok(TurnOutput {
            conversation_id,
            answer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedClient, assembled_text};
    use valet_core::error::ProviderError;
    use valet_core::message::Role;
    use valet_storage::InMemoryStore;

    const PLAN_OUTPUT: &str = r#"The user needs fresh information, so: search, then answer.
{"steps":[{"id":1,"title":"Search","action":"search","description":"find it"},{"id":2,"title":"Answer","action":"final_answer","description":"reply"}]}"#;

    fn service(client: ScriptedClient) -> (Arc<InMemoryStore>, AssistantService) {
        let store = Arc::new(InMemoryStore::new());
        let service = AssistantService::new(
            Arc::new(client),
            Arc::new(CapabilityRegistry::new()),
            store.clone(),
            "mock-model",
            0.7,
        );
        (store, service)
    }

    async fn collect(
        service: &AssistantService,
        text: &str,
    ) -> (ConversationId, Vec<AssistantEvent>) {
        let (tx, mut rx) = mpsc::channel(256);
        let conversation_id = service.chat(None, text, tx).await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (conversation_id, events)
    }

    #[tokio::test]
    async fn simple_qa_skips_planning() {
        let client = ScriptedClient::new(vec![Ok(assembled_text("Paris."))]);
        let (_store, service) = service(client);

        let (_conv, events) = collect(&service, "What is the capital of France?").await;

        // One model call, no planner reasoning in the feed
        assert!(matches!(events.last(), Some(AssistantEvent::Done)));
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, AssistantEvent::Reasoning { .. }))
        );
        let answer: String = events
            .iter()
            .filter_map(|e| match e {
                AssistantEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(answer, "Paris.");
    }

    #[tokio::test]
    async fn plan_path_runs_steps_sequentially() {
        let client = ScriptedClient::new(vec![
            Ok(assembled_text(PLAN_OUTPUT)),
            Ok(assembled_text("found it")),
            Ok(assembled_text("Here is your answer.")),
        ]);
        let requests = client.requests();
        let (store, service) = service(client);

        let (conv, events) = collect(&service, "look up the latest rust news").await;

        // Planner call + two step calls
        assert_eq!(requests.lock().unwrap().len(), 3);

        // Planner text streamed as reasoning
        assert!(
            events
                .iter()
                .any(|e| matches!(e, AssistantEvent::Reasoning { .. }))
        );
        assert!(matches!(events.last(), Some(AssistantEvent::Done)));

        // The user message was recorded exactly once
        let messages = store.recent_messages(&conv, 20).await.unwrap();
        let user_count = messages.iter().filter(|m| m.role == Role::User).count();
        assert_eq!(user_count, 1);
        assert_eq!(messages.last().unwrap().text(), "Here is your answer.");

        // Step focus reached the model in the system message
        let requests = requests.lock().unwrap();
        assert!(requests[1].messages[0].text().contains("Step 1 of 2"));
        assert!(requests[2].messages[0].text().contains("Step 2 of 2"));
        // Planner was called with capabilities withheld
        assert!(requests[0].tools.is_empty());
    }

    #[tokio::test]
    async fn unplannable_output_falls_back_to_direct() {
        let client = ScriptedClient::new(vec![
            Ok(assembled_text("I have no structured plan for this.")),
            Ok(assembled_text("Direct answer.")),
        ]);
        let requests = client.requests();
        let (_store, service) = service(client);

        let (_conv, events) = collect(&service, "research the history of the metric system").await;

        assert_eq!(requests.lock().unwrap().len(), 2);
        let answer: String = events
            .iter()
            .filter_map(|e| match e {
                AssistantEvent::Token { text } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(answer, "Direct answer.");
    }

    #[tokio::test]
    async fn failed_step_retries_once_then_moves_on() {
        let client = ScriptedClient::new(vec![
            Ok(assembled_text(PLAN_OUTPUT)),
            Err(ProviderError::Network("refused".into())),
            Ok(assembled_text("retry worked")),
            Ok(assembled_text("final answer")),
        ]);
        let requests = client.requests();
        let (store, service) = service(client);

        let (conv, events) = collect(&service, "look up something for me").await;

        // plan + step1 (failed) + step1 retry + step2
        assert_eq!(requests.lock().unwrap().len(), 4);
        assert!(matches!(events.last(), Some(AssistantEvent::Done)));

        let messages = store.recent_messages(&conv, 20).await.unwrap();
        assert_eq!(messages.last().unwrap().text(), "final answer");
    }

    #[tokio::test]
    async fn step_failure_after_retry_emits_error_but_continues() {
        let client = ScriptedClient::new(vec![
            Ok(assembled_text(PLAN_OUTPUT)),
            Err(ProviderError::Network("down".into())),
            Err(ProviderError::Network("still down".into())),
            Ok(assembled_text("answer from step 2")),
        ]);
        let (_store, service) = service(client);

        let (_conv, events) = collect(&service, "look up something for me").await;

        let errors: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, AssistantEvent::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 1);
        // The plan still ran to completion
        assert!(matches!(events.last(), Some(AssistantEvent::Done)));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_error_then_done() {
        let client = ScriptedClient::new(vec![Err(ProviderError::Network("refused".into()))]);
        let (_store, service) = service(client);

        let (_conv, events) = collect(&service, "What is Rust?").await;

        assert!(matches!(
            events[events.len() - 2],
            AssistantEvent::Error { .. }
        ));
        assert!(matches!(events.last(), Some(AssistantEvent::Done)));
    }

    #[tokio::test]
    async fn run_turn_creates_conversation_for_scheduler() {
        let client = ScriptedClient::new(vec![Ok(assembled_text("Task handled."))]);
        let requests = client.requests();
        let (store, service) = service(client);

        let output = service.run_turn(None, "check the deploy").await.unwrap();
        assert_eq!(output.answer, "Task handled.");

        let conv = store
            .get_conversation(&output.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conv.messages.len(), 2);

        // Direct execution: no planner call
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn existing_conversation_is_reused() {
        let client = ScriptedClient::new(vec![
            Ok(assembled_text("first")),
            Ok(assembled_text("second")),
        ]);
        let (store, service) = service(client);

        let first = service.run_turn(None, "hello").await.unwrap();
        let second = service
            .run_turn(Some(first.conversation_id.clone()), "again")
            .await
            .unwrap();
        assert_eq!(first.conversation_id, second.conversation_id);

        let conv = store
            .get_conversation(&first.conversation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(conv.messages.len(), 4);
    }

    #[tokio::test]
    async fn system_prompt_lists_capabilities_and_memory() {
        let dir = tempfile::tempdir().unwrap();
        let memory_path = dir.path().join("memory.md");
        std::fs::write(&memory_path, "- [2026-08-01] User prefers Celsius\n").unwrap();

        let client = ScriptedClient::new(vec![Ok(assembled_text("ok"))]);
        let requests = client.requests();
        let store = Arc::new(InMemoryStore::new());

        let mut registry = CapabilityRegistry::new();
        struct Noop;
        #[async_trait]
        impl valet_core::capability::Capability for Noop {
            fn name(&self) -> &str {
                "noop"
            }
            fn description(&self) -> &str {
                "Does nothing"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object", "properties": {}})
            }
            async fn execute(
                &self,
                _: serde_json::Value,
            ) -> Result<valet_core::capability::CapabilityOutput, valet_core::error::CapabilityError>
            {
                Ok(valet_core::capability::CapabilityOutput::text(""))
            }
        }
        registry.register(Box::new(Noop)).unwrap();

        let service = AssistantService::new(
            Arc::new(client),
            Arc::new(registry),
            store,
            "mock-model",
            0.7,
        )
        .with_memory_file(memory_path);

        service.run_turn(None, "hi").await.unwrap();

        let requests = requests.lock().unwrap();
        let system = requests[0].messages[0].text().to_string();
        assert!(system.contains("## Capabilities"));
        assert!(system.contains("noop: Does nothing"));
        assert!(system.contains("## Memory"));
        assert!(system.contains("User prefers Celsius"));
    }
}
