//! Model transport for Valet: an OpenAI-compatible streaming chat client
//! and the stream decoder that turns its SSE chunks into typed events.
//!
//! The decoder is deliberately transport-agnostic — it consumes raw bytes
//! and can be driven directly in tests — while [`OpenAiClient`] owns HTTP
//! concerns: auth headers, status mapping, and the byte stream.

pub mod client;
pub mod decoder;

pub use client::OpenAiClient;
pub use decoder::StreamDecoder;
