//! Web search capability — stub that returns mock search results.
//!
//! In production this would call a real search API (Brave, Google, etc.).
//! The stub returns plausible results so the tool loop and planner can be
//! exercised end-to-end without network access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use valet_core::capability::{Capability, CapabilityOutput};
use valet_core::error::CapabilityError;

pub struct WebSearchCapability;

#[derive(Debug, Deserialize)]
struct WebSearchArgs {
    query: String,
    #[serde(default = "default_num_results")]
    num_results: usize,
}

fn default_num_results() -> usize {
    3
}

#[derive(Debug, Clone, Serialize)]
struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

#[async_trait]
impl Capability for WebSearchCapability {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information. Returns a list of relevant results with titles, URLs, and snippets."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Number of results to return (default 3)",
                    "default": 3
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let args: WebSearchArgs = serde_json::from_value(arguments)
            .map_err(|e| CapabilityError::InvalidArguments(e.to_string()))?;

        let results = generate_mock_results(&args.query, args.num_results.min(5));
        let output = serde_json::to_string_pretty(&results).unwrap_or_default();

        Ok(CapabilityOutput {
            output,
            data: serde_json::to_value(&results).ok(),
        })
    }
}

fn generate_mock_results(query: &str, count: usize) -> Vec<SearchResult> {
    let q = query.to_lowercase();

    // Context-aware mock results for common topics.
    let templates: Vec<(&str, Vec<SearchResult>)> = vec![
        ("rust", vec![
            SearchResult {
                title: "The Rust Programming Language".into(),
                url: "https://doc.rust-lang.org/book/".into(),
                snippet: "Rust is a systems programming language focused on safety, speed, and concurrency.".into(),
            },
            SearchResult {
                title: "crates.io: Rust Package Registry".into(),
                url: "https://crates.io/".into(),
                snippet: "The Rust community's crate registry for sharing and discovering Rust libraries.".into(),
            },
        ]),
        ("news", vec![
            SearchResult {
                title: "Today's Top Headlines".into(),
                url: "https://news.example.com/top".into(),
                snippet: "A roundup of the day's most important stories across world news, business, and technology.".into(),
            },
            SearchResult {
                title: "Technology News".into(),
                url: "https://news.example.com/tech".into(),
                snippet: "The latest developments in software, hardware, and the companies building them.".into(),
            },
        ]),
    ];

    for (keyword, results) in &templates {
        if q.contains(keyword) {
            return results.iter().take(count).cloned().collect();
        }
    }

    // Generic fallback.
    (0..count)
        .map(|i| SearchResult {
            title: format!("Result {} for: {}", i + 1, query),
            url: format!("https://example.com/search?q={}&p={}", query.replace(' ', "+"), i + 1),
            snippet: format!(
                "This is a mock search result for the query '{query}'. In production, this would contain real content."
            ),
        })
        .collect()
}
