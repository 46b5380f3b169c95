//! Page browsing capability — stub that returns mock page content.
//!
//! The production implementation drives a shared browser session with an
//! idle-timeout auto-release; that session is an executor concern and
//! never leaks into the engine. The stub validates the URL and returns
//! deterministic page text.

use async_trait::async_trait;
use serde::Deserialize;
use valet_core::capability::{Capability, CapabilityOutput};
use valet_core::error::CapabilityError;

pub struct BrowsePageCapability;

#[derive(Debug, Deserialize)]
struct BrowsePageArgs {
    url: String,
    /// Optional CSS-ish hint of what part of the page matters
    #[serde(default)]
    focus: Option<String>,
}

#[async_trait]
impl Capability for BrowsePageCapability {
    fn name(&self) -> &str {
        "browse_page"
    }

    fn description(&self) -> &str {
        "Open a web page and return its readable text content. Use after web_search to read a promising result."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL of the page to open"
                },
                "focus": {
                    "type": "string",
                    "description": "Optional hint describing the section of interest"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let args: BrowsePageArgs = serde_json::from_value(arguments)
            .map_err(|e| CapabilityError::InvalidArguments(e.to_string()))?;

        if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
            return Err(CapabilityError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        let mut text = format!(
            "# Page content for {}\n\nThis is mock page text. In production this capability \
             renders the page in the shared browser session and extracts readable text.",
            args.url
        );
        if let Some(focus) = args.focus {
            text.push_str(&format!("\n\nFocused on: {focus}"));
        }

        Ok(CapabilityOutput::text(text))
    }
}
