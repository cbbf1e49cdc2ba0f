//! Conversation summary compaction (spec §3 `ConversationSummary`, §4.8
//! "conversation context assembly").
//!
//! Threshold-check, fetch-oldest-batch, LLM fact/summary extraction,
//! persist, mark-covered — driven by
//! `screenplay_conversation::ConversationManager`'s
//! `should_summarize`/`oldest_uncovered_messages`/`apply_summary`.

use std::sync::Arc;

use tracing::info;

use screenplay_conversation::{ConversationKey, ConversationManager};

use crate::client::LlmClient;
use crate::error::Result;
use crate::provider::{ChatRequest, Message, Role};

const COMPACTION_BATCH: usize = 20;
const SYSTEM: &str = "Compress this chat history into a short rolling summary: what the user has been asking for, decisions made, and any open threads. Be terse.";

/// Runs compaction for one conversation if its message count has crossed
/// `threshold` since the last summary; a no-op otherwise.
pub async fn maybe_compact(
    conversations: &Arc<ConversationManager>,
    llm: &Arc<LlmClient>,
    haiku_model: &str,
    key: &ConversationKey,
    threshold: u32,
) -> Result<bool> {
    if !conversations.should_summarize(key, threshold)? {
        return Ok(false);
    }

    let batch = conversations.oldest_uncovered_messages(key, COMPACTION_BATCH)?;
    let Some(last) = batch.last() else {
        return Ok(false);
    };

    let prior_summary = conversations.get_summary(key)?.map(|s| s.summary_text).unwrap_or_default();
    let mut transcript = String::new();
    if !prior_summary.is_empty() {
        transcript.push_str("Prior summary:\n");
        transcript.push_str(&prior_summary);
        transcript.push_str("\n\nNew messages:\n");
    }
    for message in &batch {
        transcript.push_str(&format!("{}: {}\n", message.role, message.content));
    }

    let req = ChatRequest::new(haiku_model, SYSTEM, vec![Message { role: Role::User, content: transcript }], 400);
    let resp = llm.complete(&req, "compact_conversation", Some(&key.script_id), None, None).await?;

    conversations.apply_summary(key, &resp.content, &last.id)?;
    info!(key = %key, covered_through = %last.id, "conversation compacted");
    Ok(true)
}
