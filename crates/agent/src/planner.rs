//! Plan generation — one restricted model call that turns a request into
//! an ordered step list.
//!
//! The model is invoked with the capability catalogue withheld so it
//! cannot request tool calls at this stage; it thinks out loud, then emits
//! a single JSON object of shape `{"steps": [...]}`. Parsing is forgiving:
//! anything that fails — transport, malformed JSON, no valid steps —
//! yields `None`, and the caller falls back to a direct execution run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::LazyLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use valet_core::event::AssistantEvent;
use valet_core::model::{ChatEvent, ChatRequest, ModelClient};
use valet_core::message::Message;

use crate::router::Intent;

/// What a plan step intends to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Search,
    Browse,
    Http,
    Schedule,
    Memory,
    FinalAnswer,
}

/// One step of a plan. Ids are 1-based and monotonic within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: u32,
    pub title: String,
    pub action: StepAction,
    pub description: String,
}

/// An ordered, non-empty list of steps. By convention the final step's
/// action is `final_answer`.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

const PLANNER_SYSTEM_PROMPT: &str = "\
You are the planning stage of a personal assistant. Given the user's request, think \
through what needs to happen, step by step. You cannot call tools here — you only plan.

After your reasoning, output exactly one JSON object on its own, of this shape:
{\"steps\": [{\"id\": 1, \"title\": \"...\", \"action\": \"search\", \"description\": \"...\"}]}

Rules:
- action must be one of: search, browse, http, schedule, memory, final_answer
- ids start at 1 and increase by 1
- the last step's action must be final_answer
- keep plans short: two to five steps";

/// The plan generator.
pub struct Planner {
    client: Arc<dyn ModelClient>,
    model: String,
    temperature: f32,
}

impl Planner {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    /// Generate a plan for the request, streaming the model's reasoning to
    /// `events` as it arrives. Returns `None` on any failure.
    pub async fn plan(
        &self,
        user_text: &str,
        intent: Intent,
        events: Option<&mpsc::Sender<AssistantEvent>>,
    ) -> Option<Plan> {
        let messages = vec![
            Message::system(PLANNER_SYSTEM_PROMPT),
            Message::user(format!(
                "Request (classified as {}):\n{}",
                intent.as_str(),
                user_text
            )),
        ];

        // Capability definitions deliberately withheld
        let mut request = ChatRequest::new(&self.model, messages);
        request.temperature = self.temperature;

        let mut rx = match self.client.stream_chat(request).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "Planner model call failed");
                return None;
            }
        };

        let mut assembled = None;
        while let Some(event) = rx.recv().await {
            match event {
                // Everything the planner streams is reasoning, not answer
                Ok(ChatEvent::Token(text)) | Ok(ChatEvent::Reasoning(text)) => {
                    if let Some(tx) = events {
                        let _ = tx.send(AssistantEvent::Reasoning { text }).await;
                    }
                }
                Ok(ChatEvent::ToolCallFragment { .. }) => {}
                Ok(ChatEvent::Completed(message)) => {
                    assembled = Some(message);
                }
                Err(e) => {
                    warn!(error = %e, "Planner stream failed");
                    return None;
                }
            }
        }

        let content = assembled?.content?;
        let plan = parse_plan(&content);
        match &plan {
            Some(p) => debug!(steps = p.steps.len(), "Plan parsed"),
            None => debug!("No plan recovered from model output"),
        }
        plan
    }
}

static STEPS_OBJECT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{[^{}]*"steps"\s*:\s*\["#).expect("steps regex"));
static BARE_ARRAY_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[\s*\{[^\[\]]*"action""#).expect("array regex"));

/// Locate and validate the step list inside free-form model output.
///
/// First pass: the first JSON object containing a `steps` array. Second
/// pass, when that yields nothing usable: a bare array shaped like a step
/// list. Steps with missing fields or wrong primitive types are dropped;
/// zero surviving steps means no plan.
pub fn parse_plan(text: &str) -> Option<Plan> {
    if let Some(m) = STEPS_OBJECT_START.find(text)
        && let Some(raw) = balanced_slice(text, m.start(), '{', '}')
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(raw)
        && let Some(steps) = validate_steps(value.get("steps")?.as_array()?)
    {
        return Some(Plan { steps });
    }

    // Fallback: a bare step array without the wrapping object
    if let Some(m) = BARE_ARRAY_START.find(text)
        && let Some(raw) = balanced_slice(text, m.start(), '[', ']')
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(raw)
        && let Some(steps) = validate_steps(value.as_array()?)
    {
        return Some(Plan { steps });
    }

    None
}

/// The substring from `start` to the delimiter that balances `open`.
fn balanced_slice(text: &str, start: usize, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Keep only steps whose four fields are present with the right types.
fn validate_steps(raw: &[serde_json::Value]) -> Option<Vec<PlanStep>> {
    let steps: Vec<PlanStep> = raw
        .iter()
        .filter_map(|v| serde_json::from_value::<PlanStep>(v.clone()).ok())
        .collect();
    if steps.is_empty() { None } else { Some(steps) }
}
