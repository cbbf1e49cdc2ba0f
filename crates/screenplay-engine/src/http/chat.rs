//! `Chat` entrypoint (spec §6) — POST /chat.
//!
//! Streams the synthesized answer as Server-Sent Events: a `text_delta`
//! event per chunk, then either a terminal `metadata` event (spec §6's
//! `(stream of text chunks, metadata)` return shape) or a terminal
//! `error` event (spec §7: "chat requests that fail after any partial
//! streaming output end the stream with a structured terminal event").

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;

use screenplay_agent::context::chat as chat_pipeline;
use screenplay_agent::context::topic::TopicOverride;
use screenplay_agent::stream::StreamEvent;
use screenplay_core::types::{BudgetTier, Intent};

use crate::app::AppState;
use crate::error::EngineError;

#[derive(Deserialize)]
pub struct ChatHttpRequest {
    pub script_id: String,
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub intent_hint: Option<Intent>,
    /// `"continue"` or `"new_topic"`; anything else runs the detector.
    #[serde(default)]
    pub topic_mode_override: Option<String>,
    #[serde(default)]
    pub budget: Option<BudgetTier>,
    #[serde(default)]
    pub scene_position_hint: Option<i64>,
    #[serde(default)]
    pub character_hint: Option<String>,
}

pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatHttpRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, EngineError> {
    if req.message.trim().is_empty() {
        return Err(EngineError::Validation("message must not be empty".to_string()));
    }

    let topic_override = match req.topic_mode_override.as_deref() {
        Some("continue") => Some(TopicOverride::Continue),
        Some("new_topic") => Some(TopicOverride::NewTopic),
        _ => None,
    };

    let chat_request = chat_pipeline::ChatRequest {
        script_id: req.script_id,
        user_id: req.user_id,
        message: req.message,
        intent_hint: req.intent_hint,
        topic_override,
        budget: req.budget.unwrap_or(BudgetTier::Standard),
        scene_position_hint: req.scene_position_hint,
        character_hint: req.character_hint,
    };

    let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);

    let repo = state.repo.clone();
    let conversations = state.conversations.clone();
    let llm = state.llm.clone();
    let retriever = state.retriever.clone();
    let config = state.config.clone();

    let handle = tokio::spawn(async move { chat_pipeline::chat(&repo, &conversations, &llm, &retriever, &config, chat_request, tx).await });

    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield Ok(Event::default().event(event_name(&event)).data(event_payload(&event)));
        }
        match handle.await {
            Ok(Ok(metadata)) => {
                let payload = serde_json::json!({
                    "intent": metadata.intent,
                    "topic_mode": metadata.topic_mode,
                    "topic_confidence": metadata.topic_confidence,
                    "iterations_used": metadata.iterations_used,
                })
                .to_string();
                yield Ok(Event::default().event("metadata").data(payload));
            }
            Ok(Err(e)) => {
                yield Ok(Event::default().event("error").data(serde_json::json!({ "kind": e.kind().code(), "message": e.to_string() }).to_string()));
            }
            Err(join_err) => {
                yield Ok(Event::default().event("error").data(serde_json::json!({ "kind": "internal_invariant", "message": join_err.to_string() }).to_string()));
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn event_name(event: &StreamEvent) -> &'static str {
    match event {
        StreamEvent::TextDelta { .. } => "text_delta",
        StreamEvent::ToolUse { .. } => "tool_use",
        StreamEvent::Done { .. } => "done",
        StreamEvent::Error { .. } => "error",
    }
}

fn event_payload(event: &StreamEvent) -> String {
    match event {
        StreamEvent::TextDelta { text } => serde_json::json!({ "text": text }).to_string(),
        StreamEvent::ToolUse { id, name, input } => serde_json::json!({ "id": id, "name": name, "input": input }).to_string(),
        StreamEvent::Done { model, usage, stop_reason } => serde_json::json!({
            "model": model,
            "input_tokens": usage.input_tokens,
            "output_tokens": usage.output_tokens,
            "stop_reason": stop_reason,
        })
        .to_string(),
        StreamEvent::Error { message } => serde_json::json!({ "message": message }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenplay_agent::provider::Usage;

    #[test]
    fn text_delta_maps_to_text_delta_event_with_text_payload() {
        let event = StreamEvent::TextDelta { text: "hello".to_string() };
        assert_eq!(event_name(&event), "text_delta");
        let payload: serde_json::Value = serde_json::from_str(&event_payload(&event)).unwrap();
        assert_eq!(payload["text"], "hello");
    }

    #[test]
    fn done_payload_carries_usage_and_stop_reason() {
        let event = StreamEvent::Done {
            model: "claude-sonnet-4-5".to_string(),
            usage: Usage { input_tokens: 10, cache_creation_input_tokens: 0, cache_read_input_tokens: 0, output_tokens: 20 },
            stop_reason: "end_turn".to_string(),
        };
        assert_eq!(event_name(&event), "done");
        let payload: serde_json::Value = serde_json::from_str(&event_payload(&event)).unwrap();
        assert_eq!(payload["input_tokens"], 10);
        assert_eq!(payload["output_tokens"], 20);
        assert_eq!(payload["stop_reason"], "end_turn");
    }

    #[test]
    fn tool_use_payload_carries_id_name_and_input() {
        let event = StreamEvent::ToolUse { id: "t1".to_string(), name: "get_scene".to_string(), input: serde_json::json!({"scene_id": "s1"}) };
        assert_eq!(event_name(&event), "tool_use");
        let payload: serde_json::Value = serde_json::from_str(&event_payload(&event)).unwrap();
        assert_eq!(payload["name"], "get_scene");
        assert_eq!(payload["input"]["scene_id"], "s1");
    }
}
