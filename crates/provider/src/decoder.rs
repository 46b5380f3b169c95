//! Stream decoder — reconstructs structured model output from SSE chunks.
//!
//! One decoder instance serves exactly one model call. Bytes go in through
//! [`StreamDecoder::feed`]; typed events come out as they are decoded, and
//! [`StreamDecoder::finish`] yields the assembled message once the
//! transport closes. The decoder never retries and never validates tool
//! arguments — both belong to its callers.
//!
//! Reasoning text reaches us two ways: some providers put it in a dedicated
//! delta field, others interleave `<think>...</think>` tags in the content
//! stream. The inline form is handled by a two-state machine carried across
//! chunk boundaries, so a tag split between chunks still routes correctly.

use std::collections::BTreeMap;

use serde::Deserialize;
use valet_core::model::{AssembledMessage, ChatEvent};
use valet_core::message::ToolCall;
use tracing::trace;

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Which way content fragments are currently routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteMode {
    Content,
    Reasoning,
}

/// A fragment routed to one side of the tag filter.
#[derive(Debug, Clone, PartialEq)]
enum Routed {
    Content(String),
    Reasoning(String),
}

/// Split one content fragment on inline reasoning tags.
///
/// Pure function over (state, fragment): returns the routed pieces, the
/// state after the fragment, and any trailing text that could still be the
/// beginning of a tag and must be carried into the next fragment.
fn split_fragment(mode: RouteMode, text: &str) -> (Vec<Routed>, RouteMode, String) {
    let mut out = Vec::new();
    let mut mode = mode;
    let mut rest = text;

    loop {
        let tag = match mode {
            RouteMode::Content => OPEN_TAG,
            RouteMode::Reasoning => CLOSE_TAG,
        };

        if let Some(idx) = rest.find(tag) {
            if idx > 0 {
                out.push(route(mode, &rest[..idx]));
            }
            mode = match mode {
                RouteMode::Content => RouteMode::Reasoning,
                RouteMode::Reasoning => RouteMode::Content,
            };
            rest = &rest[idx + tag.len()..];
            continue;
        }

        // No full tag. Hold back the longest suffix that is a proper
        // prefix of the tag we are looking for, emit the rest.
        let keep = partial_tag_suffix(rest, tag);
        let emit = &rest[..rest.len() - keep.len()];
        if !emit.is_empty() {
            out.push(route(mode, emit));
        }
        return (out, mode, keep.to_string());
    }
}

fn route(mode: RouteMode, text: &str) -> Routed {
    match mode {
        RouteMode::Content => Routed::Content(text.to_string()),
        RouteMode::Reasoning => Routed::Reasoning(text.to_string()),
    }
}

/// The longest suffix of `text` that is a non-empty proper prefix of `tag`.
fn partial_tag_suffix<'a>(text: &'a str, tag: &str) -> &'a str {
    let max = tag.len().saturating_sub(1).min(text.len());
    for len in (1..=max).rev() {
        if text.is_char_boundary(text.len() - len) && tag.starts_with(&text[text.len() - len..]) {
            return &text[text.len() - len..];
        }
    }
    ""
}

/// The inline-tag state machine, carried across chunk-processing calls.
#[derive(Debug)]
struct ReasoningTagFilter {
    mode: RouteMode,
    carry: String,
}

impl ReasoningTagFilter {
    fn new() -> Self {
        Self {
            mode: RouteMode::Content,
            carry: String::new(),
        }
    }

    fn push(&mut self, fragment: &str) -> Vec<Routed> {
        let text = format!("{}{}", self.carry, fragment);
        let (out, mode, carry) = split_fragment(self.mode, &text);
        self.mode = mode;
        self.carry = carry;
        out
    }

    /// Release held-back text at end of stream. A dangling partial tag is
    /// treated as literal text in the current mode.
    fn flush(&mut self) -> Option<Routed> {
        if self.carry.is_empty() {
            return None;
        }
        let carry = std::mem::take(&mut self.carry);
        Some(route(self.mode, &carry))
    }
}

/// Accumulates incremental tool-call deltas into a complete tool call.
///
/// Argument text concatenates across fragments — never replaces — and the
/// first non-empty id/name seen for an index wins.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

// --- SSE payload types ---

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta — arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Decodes the SSE byte stream of one model call.
pub struct StreamDecoder {
    buffer: String,
    filter: ReasoningTagFilter,
    content: String,
    accumulators: BTreeMap<u32, ToolCallAccumulator>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            filter: ReasoningTagFilter::new(),
            content: String::new(),
            accumulators: BTreeMap::new(),
        }
    }

    /// Feed a transport chunk; returns the events it completed.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<ChatEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);

            // Skip blank lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            // "[DONE]" is transport bookkeeping, not an event
            if data == "[DONE]" {
                continue;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(response) => self.apply(response, &mut events),
                Err(e) => {
                    trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                }
            }
        }
        events
    }

    fn apply(&mut self, response: StreamResponse, events: &mut Vec<ChatEvent>) {
        let Some(choice) = response.choices.into_iter().next() else {
            return;
        };
        let delta = choice.delta;

        // Dedicated reasoning field
        let reasoning = delta.reasoning.or(delta.reasoning_content);
        if let Some(text) = reasoning
            && !text.is_empty()
        {
            events.push(ChatEvent::Reasoning(text));
        }

        // Content fragment, routed through the inline-tag filter
        if let Some(text) = delta.content
            && !text.is_empty()
        {
            for routed in self.filter.push(&text) {
                events.push(self.routed_event(routed));
            }
        }

        // Tool-call fragments, accumulated per index
        if let Some(deltas) = delta.tool_calls {
            for tc in deltas {
                let acc = self.accumulators.entry(tc.index).or_default();

                if let Some(id) = tc.id
                    && acc.id.is_empty()
                    && !id.is_empty()
                {
                    acc.id = id;
                }

                let mut fragment_name = None;
                let mut fragment_args = String::new();
                if let Some(function) = tc.function {
                    if let Some(name) = function.name {
                        if acc.name.is_empty() && !name.is_empty() {
                            acc.name = name.clone();
                        }
                        fragment_name = Some(name);
                    }
                    if let Some(args) = function.arguments {
                        acc.arguments.push_str(&args);
                        fragment_args = args;
                    }
                }

                events.push(ChatEvent::ToolCallFragment {
                    index: tc.index,
                    name: fragment_name,
                    arguments: fragment_args,
                });
            }
        }
    }

    fn routed_event(&mut self, routed: Routed) -> ChatEvent {
        match routed {
            Routed::Content(text) => {
                self.content.push_str(&text);
                ChatEvent::Token(text)
            }
            Routed::Reasoning(text) => ChatEvent::Reasoning(text),
        }
    }

    /// Close the decoder: release any held-back tag text and assemble the
    /// final message. Argument strings are passed through unparsed.
    pub fn finish(mut self) -> (Vec<ChatEvent>, AssembledMessage) {
        let mut events = Vec::new();
        if let Some(routed) = self.filter.flush() {
            events.push(self.routed_event(routed));
        }

        let content = if self.content.is_empty() {
            None
        } else {
            Some(self.content)
        };

        let tool_calls = if self.accumulators.is_empty() {
            None
        } else {
            // BTreeMap iterates in index order
            Some(
                self.accumulators
                    .into_values()
                    .map(ToolCallAccumulator::into_tool_call)
                    .collect(),
            )
        };

        (events, AssembledMessage { content, tool_calls })
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sse(payload: &str) -> Vec<u8> {
        format!("data: {payload}\n\n").into_bytes()
    }

    fn content_chunk(text: &str) -> Vec<u8> {
        sse(&serde_json::json!({"choices":[{"delta":{"content": text}}]}).to_string())
    }

    fn collect_text(events: &[ChatEvent]) -> (String, String) {
        let mut content = String::new();
        let mut reasoning = String::new();
        for event in events {
            match event {
                ChatEvent::Token(t) => content.push_str(t),
                ChatEvent::Reasoning(t) => reasoning.push_str(t),
                _ => {}
            }
        }
        (content, reasoning)
    }

    #[test]
    fn plain_content_tokens() {
        let mut decoder = StreamDecoder::new();
        let mut events = decoder.feed(&content_chunk("Hello"));
        events.extend(decoder.feed(&content_chunk(" world")));

        let (content, reasoning) = collect_text(&events);
        assert_eq!(content, "Hello world");
        assert!(reasoning.is_empty());

        let (_, assembled) = decoder.finish();
        assert_eq!(assembled.content.as_deref(), Some("Hello world"));
        assert!(assembled.tool_calls.is_none());
    }

    #[test]
    fn dedicated_reasoning_field() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(&sse(
            &serde_json::json!({"choices":[{"delta":{"reasoning":"hmm"}}]}).to_string(),
        ));
        assert_eq!(events, vec![ChatEvent::Reasoning("hmm".into())]);

        let (_, assembled) = decoder.finish();
        // Reasoning never leaks into assembled content
        assert!(assembled.content.is_none());
    }

    #[test]
    fn inline_tags_split_across_chunk_boundaries() {
        // The canonical boundary-straddling sequence: tag characters fall
        // on both sides of chunk boundaries.
        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for fragment in ["<thi", "nk>hello", " world</thi", "nk>answer"] {
            events.extend(decoder.feed(&content_chunk(fragment)));
        }
        let (tail, assembled) = decoder.finish();
        events.extend(tail);

        let (content, reasoning) = collect_text(&events);
        assert_eq!(reasoning, "hello world");
        assert_eq!(content, "answer");
        assert_eq!(assembled.content.as_deref(), Some("answer"));
    }

    #[test]
    fn open_and_close_within_one_fragment() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(&content_chunk("a<think>b</think>c"));
        let (content, reasoning) = collect_text(&events);
        assert_eq!(content, "ac");
        assert_eq!(reasoning, "b");
    }

    #[test]
    fn reasoning_mode_persists_across_fragments() {
        let mut decoder = StreamDecoder::new();
        let mut events = decoder.feed(&content_chunk("<think>first"));
        events.extend(decoder.feed(&content_chunk(" second")));
        events.extend(decoder.feed(&content_chunk(" third</think>done")));

        let (content, reasoning) = collect_text(&events);
        assert_eq!(reasoning, "first second third");
        assert_eq!(content, "done");
    }

    #[test]
    fn dangling_partial_tag_flushes_as_literal() {
        let mut decoder = StreamDecoder::new();
        let mut events = decoder.feed(&content_chunk("answer<thi"));
        let (tail, assembled) = decoder.finish();
        events.extend(tail);

        let (content, _) = collect_text(&events);
        assert_eq!(content, "answer<thi");
        assert_eq!(assembled.content.as_deref(), Some("answer<thi"));
    }

    #[test]
    fn angle_bracket_that_is_not_a_tag_passes_through() {
        let mut decoder = StreamDecoder::new();
        let mut events = decoder.feed(&content_chunk("a < b and <td> too"));
        let (tail, _) = decoder.finish();
        events.extend(tail);
        let (content, reasoning) = collect_text(&events);
        assert_eq!(content, "a < b and <td> too");
        assert!(reasoning.is_empty());
    }

    #[test]
    fn tool_call_fragments_assemble_in_index_order() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","function":{"name":"web_search","arguments":""}}]}}]}"#,
        ));
        decoder.feed(&sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_b","function":{"name":"http_request","arguments":"{}"}}]}}]}"#,
        ));
        decoder.feed(&sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"query\":\"x\"}"}}]}}]}"#,
        ));

        let (_, assembled) = decoder.finish();
        let calls = assembled.tool_calls.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].name, "web_search");
        assert_eq!(calls[0].arguments, r#"{"query":"x"}"#);
        assert_eq!(calls[1].id, "call_b");
    }

    #[test]
    fn argument_fragments_concatenate() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"web_search","arguments":"{\"q\":"}}]}}]}"#,
        ));
        decoder.feed(&sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"x\"}"}}]}}]}"#,
        ));

        let (_, assembled) = decoder.finish();
        let calls = assembled.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments, r#"{"q":"x"}"#);
        // The assembled argument string is valid JSON
        let parsed: serde_json::Value = serde_json::from_str(&calls[0].arguments).unwrap();
        assert_eq!(parsed["q"], "x");
    }

    #[test]
    fn first_nonempty_id_wins() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(&sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_first","function":{"name":"memory"}}]}}]}"#,
        ));
        decoder.feed(&sse(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_second","function":{"arguments":"{}"}}]}}]}"#,
        ));

        let (_, assembled) = decoder.finish();
        let calls = assembled.tool_calls.unwrap();
        assert_eq!(calls[0].id, "call_first");
    }

    #[test]
    fn sse_lines_split_across_byte_chunks() {
        let full = content_chunk("hi there");
        let mut decoder = StreamDecoder::new();
        let mut events = decoder.feed(&full[..10]);
        events.extend(decoder.feed(&full[10..]));
        let (content, _) = collect_text(&events);
        assert_eq!(content, "hi there");
    }

    #[test]
    fn non_event_lines_ignored() {
        let mut decoder = StreamDecoder::new();
        let events = decoder.feed(b": keep-alive\n\nevent: ping\ndata: [DONE]\n\n");
        assert!(events.is_empty());
        let (_, assembled) = decoder.finish();
        assert!(assembled.content.is_none());
        assert!(assembled.tool_calls.is_none());
    }

    #[test]
    fn unparseable_payload_skipped() {
        let mut decoder = StreamDecoder::new();
        let mut events = decoder.feed(b"data: {not json}\n");
        events.extend(decoder.feed(&content_chunk("ok")));
        let (content, _) = collect_text(&events);
        assert_eq!(content, "ok");
    }

    #[test]
    fn split_fragment_is_pure() {
        let (out, mode, carry) = split_fragment(RouteMode::Content, "a<think>b");
        assert_eq!(
            out,
            vec![Routed::Content("a".into()), Routed::Reasoning("b".into())]
        );
        assert_eq!(mode, RouteMode::Reasoning);
        assert!(carry.is_empty());

        // Same inputs, same outputs
        let (out2, ..) = split_fragment(RouteMode::Content, "a<think>b");
        assert_eq!(out, out2);
    }

    #[test]
    fn partial_suffix_detection() {
        assert_eq!(partial_tag_suffix("abc<", OPEN_TAG), "<");
        assert_eq!(partial_tag_suffix("abc<think", OPEN_TAG), "<think");
        assert_eq!(partial_tag_suffix("abc", OPEN_TAG), "");
        // A full tag is not a partial suffix
        assert_eq!(partial_tag_suffix("x</think", CLOSE_TAG), "</think");
    }
}
