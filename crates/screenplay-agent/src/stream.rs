use crate::provider::Usage;

/// Events emitted during LLM streaming response (spec §4.6, §9
/// "Streaming": a lazy finite sequence of text chunks terminated by
/// either a final usage record or a terminal error event).
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    TextDelta { text: String },

    /// Model wants to call a tool (spec §4.8 tool loop).
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Stream completed successfully.
    Done {
        model: String,
        usage: Usage,
        stop_reason: String,
    },

    /// Terminal error event. Per spec §5, a cancelled or failed stream
    /// still carries the partial usage already accumulated by the caller
    /// so it can be recorded.
    Error { message: String },
}

/// Parse a single SSE line from the Anthropic streaming API.
/// SSE format: `event: <type>\ndata: <json>\n\n`
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ").map(|data| SseParsed::Data(data.to_string()))
    }
}

#[derive(Debug)]
pub enum SseParsed {
    Event(String),
    Data(String),
}
