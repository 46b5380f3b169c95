//! HTTP request capability — stub that returns mock HTTP responses.
//!
//! In production this would use `reqwest` to make real HTTP calls. The
//! stub validates arguments the same way and returns realistic mock
//! responses so the loop can be tested end-to-end without network access.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use valet_core::capability::{Capability, CapabilityOutput};
use valet_core::error::CapabilityError;

pub struct HttpRequestCapability;

#[derive(Debug, Deserialize)]
struct HttpRequestArgs {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

#[async_trait]
impl Capability for HttpRequestCapability {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to a URL. Supports GET, POST, PUT, PATCH, and DELETE methods. \
         Returns the response status code and body."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to send the request to"
                },
                "method": {
                    "type": "string",
                    "description": "HTTP method. Defaults to GET.",
                    "enum": ["GET", "POST", "PUT", "PATCH", "DELETE"],
                    "default": "GET"
                },
                "headers": {
                    "type": "object",
                    "description": "Optional HTTP headers as key-value pairs",
                    "additionalProperties": { "type": "string" }
                },
                "body": {
                    "type": "string",
                    "description": "Optional request body (for POST, PUT, PATCH)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let args: HttpRequestArgs = serde_json::from_value(arguments)
            .map_err(|e| CapabilityError::InvalidArguments(e.to_string()))?;

        let method = args.method.to_uppercase();
        if !matches!(method.as_str(), "GET" | "POST" | "PUT" | "PATCH" | "DELETE") {
            return Err(CapabilityError::InvalidArguments(format!(
                "Invalid HTTP method: {method}. Must be GET, POST, PUT, PATCH, or DELETE."
            )));
        }

        if !args.url.starts_with("http://") && !args.url.starts_with("https://") {
            return Err(CapabilityError::InvalidArguments(
                "URL must start with http:// or https://".into(),
            ));
        }

        // Mock response shaped like the real thing
        let response = serde_json::json!({
            "status": 200,
            "url": args.url,
            "method": method,
            "headers_sent": args.headers.len(),
            "body": format!(
                "Mock response for {} {}{}",
                method,
                args.url,
                args.body.map(|b| format!(" (request body: {} bytes)", b.len())).unwrap_or_default()
            ),
        });

        Ok(CapabilityOutput {
            output: serde_json::to_string_pretty(&response).unwrap_or_default(),
            data: Some(response),
        })
    }
}
