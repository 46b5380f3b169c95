//! Intent classification — cheap, deterministic tagging of incoming
//! requests.
//!
//! A pure function: text in, one of five categories out. Never fails,
//! never touches the network. Categories are checked in a fixed order and
//! the first match wins; long-running phrasing is checked before tool
//! phrasing because the two overlap ("every day, send me a summary" must
//! schedule, not send once).

/// The five request categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Recurring or deferred work that should become a scheduled task
    LongRunning,
    /// A concrete action: send, post, remember, schedule once
    ToolTask,
    /// Needs fresh information from search or browsing
    ResearchTask,
    /// A short factual question answerable directly
    SimpleQa,
    /// Everything else: multi-step reasoning, analysis, generation
    ComplexReasoning,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::LongRunning => "long_running",
            Intent::ToolTask => "tool_task",
            Intent::ResearchTask => "research_task",
            Intent::SimpleQa => "simple_qa",
            Intent::ComplexReasoning => "complex_reasoning",
        }
    }
}

/// Recurring/periodic phrasing (contains, case-insensitive).
const LONG_RUNNING_KEYWORDS: &[&str] = &[
    "every day",
    "every morning",
    "every evening",
    "every night",
    "every hour",
    "every week",
    "every month",
    "each day",
    "each week",
    "daily",
    "hourly",
    "weekly",
    "monthly",
    "recurring",
    "periodically",
    "regularly",
    "keep checking",
    "keep monitoring",
    "keep track of",
    "on a schedule",
    "remind me every",
];

/// Tool-invocation phrasing (contains, case-insensitive).
const TOOL_KEYWORDS: &[&str] = &[
    "send",
    "post ",
    "remember",
    "remind",
    "reminder",
    "save this",
    "note this",
    "note down",
    "write down",
    "schedule",
    "notify",
    "message",
    "telegram",
    "slack",
    "discord",
    "whatsapp",
    "email",
];

/// Research phrasing (contains, case-insensitive).
const RESEARCH_KEYWORDS: &[&str] = &[
    "search",
    "look up",
    "browse",
    "find out",
    "research",
    "latest",
    "news",
    "current",
    "today's",
    "what's happening",
    "weather",
    "price of",
    "stock",
];

/// Leading words that make short text look like a question.
const QUESTION_STARTERS: &[&str] = &[
    "what", "who", "whom", "whose", "when", "where", "why", "how", "which", "is", "are", "am",
    "was", "were", "do", "does", "did", "can", "could", "will", "would", "should", "shall", "may",
    "might", "have", "has",
];

/// Text shorter than this that looks interrogative counts as simple Q&A.
const SIMPLE_QA_MAX_LEN: usize = 120;

/// Classify a request. First match wins, in this order:
/// long-running → tool → research → short question → complex.
pub fn classify(text: &str) -> Intent {
    let lower = text.trim().to_lowercase();

    if LONG_RUNNING_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Intent::LongRunning;
    }

    if TOOL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Intent::ToolTask;
    }

    if RESEARCH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Intent::ResearchTask;
    }

    if lower.len() < SIMPLE_QA_MAX_LEN && looks_interrogative(&lower) {
        return Intent::SimpleQa;
    }

    Intent::ComplexReasoning
}

fn looks_interrogative(lower: &str) -> bool {
    if lower.ends_with('?') {
        return true;
    }
    let first_word = lower.split_whitespace().next().unwrap_or("");
    QUESTION_STARTERS.contains(&first_word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_running_beats_tool_keywords() {
        // Contains both "every day" (long-running) and "send" (tool):
        // category-1 precedence must hold.
        assert_eq!(
            classify("Every day at 9am, send me a summary of my inbox"),
            Intent::LongRunning
        );
        assert_eq!(
            classify("remind me every week to water the plants"),
            Intent::LongRunning
        );
        assert_eq!(
            classify("keep monitoring the deploy and message me about failures"),
            Intent::LongRunning
        );
    }

    #[test]
    fn tool_task_detection() {
        assert_eq!(
            classify("Send a message to Alex that I'm running late"),
            Intent::ToolTask
        );
        assert_eq!(
            classify("Remember that my anniversary is June 3rd"),
            Intent::ToolTask
        );
        assert_eq!(
            classify("schedule a reminder for tomorrow at noon"),
            Intent::ToolTask
        );
    }

    #[test]
    fn research_task_detection() {
        assert_eq!(
            classify("Look up the latest rust release notes"),
            Intent::ResearchTask
        );
        assert_eq!(classify("what's happening in tech today"), Intent::ResearchTask);
    }

    #[test]
    fn simple_qa_detection() {
        assert_eq!(classify("What is the capital of France?"), Intent::SimpleQa);
        assert_eq!(classify("is tokio single threaded"), Intent::SimpleQa);
        // Question mark alone qualifies short text
        assert_eq!(classify("France capital?"), Intent::SimpleQa);
    }

    #[test]
    fn long_question_is_complex() {
        let long = "How would you architect a distributed system that needs to handle \
                    millions of concurrent connections while keeping tail latency low and \
                    remaining operable by a small team";
        assert_eq!(classify(long), Intent::ComplexReasoning);
    }

    #[test]
    fn default_is_complex_reasoning() {
        assert_eq!(
            classify("Draft an essay comparing two approaches to error handling in Rust"),
            Intent::ComplexReasoning
        );
    }

    #[test]
    fn classification_is_case_insensitive() {
        assert_eq!(classify("EVERY DAY check the weather"), Intent::LongRunning);
        assert_eq!(classify("SEND the report"), Intent::ToolTask);
    }

    #[test]
    fn never_fails_on_odd_input() {
        classify("");
        classify("   ");
        classify("🦀");
    }
}
