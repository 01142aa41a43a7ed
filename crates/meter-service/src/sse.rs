//! Streaming SSE usage extractor (C4).
//!
//! Parses token-usage fields out of an Anthropic Messages API event stream
//! while handing every byte through to the client untouched. Parsing never
//! gates delivery: a chunk is available to the consumer before (or
//! regardless of) whether it parses as a complete event.

use meter_core::UsageTokens;
use serde_json::Value;

/// Incremental SSE parser that accumulates [`UsageTokens`] and the most
/// recently observed `model` string.
///
/// Owned by a single request's stream-processing task; never shared across
/// tasks, so it needs no internal locking.
#[derive(Debug, Default)]
pub struct SseUsageExtractor {
    buffer: String,
    usage: UsageTokens,
    model: Option<String>,
}

impl SseUsageExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of upstream bytes. Invalid UTF-8 is handled lossily so
    /// a chunk boundary splitting a multi-byte character never panics or
    /// drops the chunk.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        self.drain_complete_lines();
    }

    /// Flush any residual buffered line through the parser. Call once after
    /// the upstream stream ends.
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.handle_line(&line);
        }
    }

    /// Usage observed so far; safe to call at any point, including after
    /// [`SseUsageExtractor::finish`].
    #[must_use]
    pub fn usage(&self) -> UsageTokens {
        self.usage
    }

    /// Model id observed so far, if any `message_start` event carried one.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn drain_complete_lines(&mut self) {
        loop {
            let Some(pos) = self.buffer.find('\n') else { break };
            let line = self.buffer[..pos].to_string();
            self.buffer.drain(..=pos);
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, line: &str) {
        let Some(data) = line.strip_prefix("data: ") else { return };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            return;
        }

        let Ok(event) = serde_json::from_str::<Value>(data) else { return };
        self.apply_event(&event);
    }

    fn apply_event(&mut self, event: &Value) {
        let Some(event_type) = event.get("type").and_then(Value::as_str) else { return };

        match event_type {
            "message_start" => {
                let Some(message) = event.get("message") else { return };
                if let Some(model) = message.get("model").and_then(Value::as_str) {
                    self.model = Some(model.to_string());
                }
                let Some(usage) = message.get("usage") else { return };
                self.usage.input_tokens = field_u64(usage, "input_tokens").unwrap_or(0);
                self.usage.cache_read_tokens = field_u64(usage, "cache_read_input_tokens").unwrap_or(0);
                self.usage.cache_creation_tokens = field_u64(usage, "cache_creation_input_tokens").unwrap_or(0);
            }
            "message_delta" => {
                let Some(usage) = event.get("usage") else { return };
                if let Some(v) = field_u64(usage, "output_tokens") {
                    self.usage.output_tokens = v;
                }
                if let Some(v) = field_u64(usage, "input_tokens") {
                    self.usage.input_tokens = v;
                }
                if let Some(v) = field_u64(usage, "cache_read_input_tokens") {
                    self.usage.cache_read_tokens = v;
                }
                if let Some(v) = field_u64(usage, "cache_creation_input_tokens") {
                    self.usage.cache_creation_tokens = v;
                }
            }
            _ => {}
        }
    }
}

fn field_u64(value: &Value, key: &str) -> Option<u64> {
    value.get(key).and_then(Value::as_u64)
}
