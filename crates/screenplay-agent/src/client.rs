//! LLM Client (C6, spec §4.6).
//!
//! Wraps an `LlmProvider` + `EmbeddingProvider` pair with retry/backoff,
//! deadlines, and per-call usage recording through a first-class
//! `UsageRecorder` path every call goes through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{instrument, warn};

use screenplay_store::ScriptRepository;

use crate::cost::compute_cost;
use crate::error::{AgentError, Result};
use crate::provider::{ChatRequest, ChatResponse, EmbeddingProvider, LlmProvider, ProviderError, Usage};
use crate::stream::StreamEvent;

/// Backoff schedule for transient provider errors (spec §4.6: "retryable
/// up to 3x with exponential backoff 0.5s/2s/8s").
const BACKOFF: [Duration; 3] = [Duration::from_millis(500), Duration::from_secs(2), Duration::from_secs(8)];

pub const DEADLINE_COMPLETE: Duration = Duration::from_secs(60);
pub const DEADLINE_STREAM: Duration = Duration::from_secs(120);
pub const DEADLINE_EMBED: Duration = Duration::from_secs(30);

pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    repo: Arc<ScriptRepository>,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LlmProvider>, embedder: Arc<dyn EmbeddingProvider>, repo: Arc<ScriptRepository>) -> Self {
        Self { provider, embedder, repo }
    }

    /// Non-streaming completion. Retries transient errors up to
    /// `BACKOFF`'s schedule, except a `RateLimited` error honors its own
    /// `retry_after_ms` instead of the fixed schedule (spec §4.6). Records
    /// one usage row per attempt that actually reaches the provider
    /// (failed attempts before any response don't produce a usage row,
    /// matching spec §4.6: usage is recorded per *call*, not per
    /// retry-internal no-op). `operation` tags the resulting
    /// `operation_metrics` row (e.g. `CHAT_TOOL_CALL`, `CHAT_SYNTHESIS`,
    /// `refresh_scene_summary`) so distinct call sites are distinguishable
    /// in the metrics table (spec §4.8).
    #[instrument(skip(self, req), fields(model = %req.model))]
    pub async fn complete(&self, req: &ChatRequest, operation: &str, script_id: Option<&str>, iteration: Option<i64>, tool_name: Option<&str>) -> Result<ChatResponse> {
        let start = Instant::now();
        let mut last_err: Option<ProviderError> = None;

        for attempt in 0..=BACKOFF.len() {
            if attempt > 0 {
                let delay = match &last_err {
                    Some(ProviderError::RateLimited { retry_after_ms }) => Duration::from_millis(*retry_after_ms),
                    _ => BACKOFF[attempt - 1],
                };
                tokio::time::sleep(delay).await;
            }

            let call = timeout(DEADLINE_COMPLETE, self.provider.send(req));
            match call.await {
                Ok(Ok(resp)) => {
                    self.record(req, operation, script_id, &resp.model, resp.usage, start.elapsed(), iteration, tool_name, true, None);
                    return Ok(resp);
                }
                Ok(Err(e)) => {
                    let retryable = e.retryable();
                    last_err = Some(e);
                    if !retryable || attempt == BACKOFF.len() {
                        break;
                    }
                    warn!(attempt, "llm call failed, retrying");
                }
                Err(_) => {
                    last_err = Some(ProviderError::Unavailable("deadline exceeded".into()));
                    break;
                }
            }
        }

        let err = last_err.unwrap_or(ProviderError::Unavailable("no attempts made".into()));
        self.record_failure(operation, script_id, start.elapsed(), err.kind());
        Err(AgentError::Provider(err))
    }

    /// Streaming completion (spec §4.6 `stream-complete`, §9 streaming
    /// contract). The caller's channel receives `TextDelta`/`ToolUse`
    /// events; a usage row is recorded from the terminal `Done`/`Error`
    /// event even when the stream is cancelled partway, since partial
    /// output must survive for billing (spec §5).
    #[instrument(skip(self, req, tx), fields(model = %req.model))]
    pub async fn stream_complete(&self, req: &ChatRequest, operation: &str, tx: mpsc::Sender<StreamEvent>, script_id: Option<&str>) -> Result<()> {
        let start = Instant::now();
        let (inner_tx, mut inner_rx) = mpsc::channel::<StreamEvent>(64);

        let provider = self.provider.clone();
        let req_clone = req.clone();
        let send_task = tokio::spawn(async move {
            let _ = timeout(DEADLINE_STREAM, provider.send_stream(&req_clone, inner_tx)).await;
        });

        let mut final_usage = Usage::default();
        let mut final_model = req.model.clone();
        let mut error_message = None;

        while let Some(event) = inner_rx.recv().await {
            match &event {
                StreamEvent::Done { model, usage, .. } => {
                    final_usage = *usage;
                    final_model = model.clone();
                }
                StreamEvent::Error { message } => {
                    error_message = Some(message.clone());
                }
                _ => {}
            }
            if tx.send(event).await.is_err() {
                break;
            }
        }

        let _ = send_task.await;

        self.record(req, operation, script_id, &final_model, final_usage, start.elapsed(), None, None, error_message.is_none(), error_message.as_deref());

        if let Some(msg) = error_message {
            return Err(AgentError::Provider(ProviderError::Unavailable(msg)));
        }
        Ok(())
    }

    /// Batch embedding (spec §4.6 `embed`). Callers are responsible for
    /// chunking to the 96-text batch limit (spec §4.5/§5); this method
    /// issues exactly one request per call.
    #[instrument(skip(self, texts), fields(model, count = texts.len()))]
    pub async fn embed(&self, model: &str, texts: &[String], script_id: Option<&str>) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let result = timeout(DEADLINE_EMBED, self.embedder.embed(model, texts)).await;
        match result {
            Ok(Ok((vectors, usage))) => {
                self.record_usage_row(script_id, model, usage, start.elapsed(), None, None);
                self.record_metric("embed", script_id, true, start.elapsed(), None);
                Ok(vectors)
            }
            Ok(Err(e)) => {
                self.record_metric("embed", script_id, false, start.elapsed(), Some(e.kind().code()));
                Err(AgentError::Provider(e))
            }
            Err(_) => {
                self.record_metric("embed", script_id, false, start.elapsed(), Some("dependency_transient"));
                Err(AgentError::Deadline(DEADLINE_EMBED))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &self,
        req: &ChatRequest,
        operation: &str,
        script_id: Option<&str>,
        model: &str,
        usage: Usage,
        latency: Duration,
        iteration: Option<i64>,
        tool_name: Option<&str>,
        success: bool,
        error_kind: Option<&str>,
    ) {
        let _ = req;
        self.record_usage_row(script_id, model, usage, latency, iteration, tool_name);
        self.record_metric(operation, script_id, success, latency, error_kind);
    }

    fn record_usage_row(&self, script_id: Option<&str>, model: &str, usage: Usage, latency: Duration, iteration: Option<i64>, tool_name: Option<&str>) {
        let cost = compute_cost(model, &usage);
        let row = screenplay_store::types::TokenUsage {
            id: 0,
            script_id: script_id.map(|s| s.to_string()),
            model: model.to_string(),
            input_tokens: usage.input_tokens as i64,
            cache_creation_tokens: usage.cache_creation_input_tokens as i64,
            cache_read_tokens: usage.cache_read_input_tokens as i64,
            output_tokens: usage.output_tokens as i64,
            cost_usd: cost,
            latency_ms: latency.as_millis() as i64,
            iteration,
            tool_name: tool_name.map(|s| s.to_string()),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = self.repo.record_token_usage(&row) {
            warn!(error = %e, "failed to record token usage");
        }
    }

    fn record_metric(&self, operation: &str, script_id: Option<&str>, success: bool, latency: Duration, error_kind: Option<&str>) {
        if let Err(e) = self.repo.record_operation_metric(operation, script_id, success, latency.as_millis() as i64, error_kind) {
            warn!(error = %e, "failed to record operation metric");
        }
    }

    fn record_failure(&self, operation: &str, script_id: Option<&str>, latency: Duration, kind: screenplay_core::error::ErrorKind) {
        self.record_metric(operation, script_id, false, latency, Some(kind.code()));
    }
}
