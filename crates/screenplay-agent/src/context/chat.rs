//! Chat entrypoint (spec §6 `Chat`).
//!
//! `Chat(script_id, conversation_id, user_message, intent_hint?,
//! topic_mode_override?, budget)` ties together conversation memory,
//! intent classification, topic detection, retrieval, the tool loop, and
//! prompt assembly into one streamed response over the fixed six-tool
//! screenplay catalog.

use std::sync::Arc;

use tokio::sync::mpsc;

use screenplay_conversation::{ConversationKey, ConversationManager, Role as ConvRole};
use screenplay_core::config::ScreenplayConfig;
use screenplay_core::types::{BudgetTier, Intent, TopicMode};
use screenplay_store::ScriptRepository;

use crate::client::LlmClient;
use crate::error::Result;
use crate::retrieval::{RetrievalHints, Retriever};
use crate::stream::StreamEvent;

use super::intent;
use super::prompt::{self, PromptInputs};
use super::tool_loop;
use super::tools;
use super::topic::{self, TopicOverride};
use crate::compact;

const SYSTEM_PROMPT: &str = "You are a collaborative screenplay writing assistant. Ground every claim in the retrieved material and tool results; never invent scene content you haven't seen.";

pub struct ChatRequest {
    pub script_id: String,
    pub user_id: String,
    pub message: String,
    pub intent_hint: Option<Intent>,
    pub topic_override: Option<TopicOverride>,
    pub budget: BudgetTier,
    pub scene_position_hint: Option<i64>,
    pub character_hint: Option<String>,
}

pub struct ChatMetadata {
    pub intent: Intent,
    pub topic_mode: TopicMode,
    pub topic_confidence: f64,
    pub iterations_used: usize,
}

/// Runs one chat turn, streaming the final synthesized answer to `tx` and
/// returning classification/retrieval metadata once the turn completes.
pub async fn chat(
    repo: &Arc<ScriptRepository>,
    conversations: &Arc<ConversationManager>,
    llm: &Arc<LlmClient>,
    retriever: &Arc<Retriever>,
    cfg: &ScreenplayConfig,
    req: ChatRequest,
    tx: mpsc::Sender<StreamEvent>,
) -> Result<ChatMetadata> {
    let key = ConversationKey::new(req.script_id.clone(), req.user_id.clone());
    let anthropic = cfg.providers.anthropic.clone().unwrap_or_default();

    conversations.record_message(&key, ConvRole::User, &req.message, None, None)?;

    let classified_intent = intent::classify(llm, &anthropic.haiku_model, &req.message, req.intent_hint, Some(&req.script_id)).await?;

    let history = conversations.list_messages(&key, 20)?;
    let last_assistant = history.iter().rev().find(|m| m.role == ConvRole::Assistant).map(|m| m.content.as_str());
    let topic = topic::detect(&req.message, last_assistant, req.topic_override);

    let hints = RetrievalHints { scene_position: req.scene_position_hint, character_name: req.character_hint.clone() };
    let retrieval = retriever.retrieve_for_intent(classified_intent, &req.script_id, &req.message, &hints).await?;

    let conversation_text = history
        .iter()
        .map(|m| format!("{:?}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");

    let catalog = tools::build_catalog(repo.clone(), retriever.clone(), &req.script_id);
    let seed_messages = vec![crate::provider::Message { role: crate::provider::Role::User, content: req.message.clone() }];

    let outcome = tool_loop::run(llm, &anthropic.sonnet_model, SYSTEM_PROMPT, seed_messages, &catalog, &req.message, Some(&req.script_id)).await?;

    let prompt_inputs = PromptInputs {
        intent: classified_intent,
        topic_mode: topic.mode,
        retrieval: &retrieval,
        conversation_text: &conversation_text,
        evidence: Some(&outcome.evidence),
        global_context: "",
        system_prompt: SYSTEM_PROMPT,
    };
    let assembled = prompt::assemble(req.budget, &cfg.budgets, &prompt_inputs);

    let answer_tx = tx.clone();
    let mut full_answer = String::new();
    let (collect_tx, mut collect_rx) = mpsc::channel::<StreamEvent>(64);
    let synth = tool_loop::synthesize_stream(llm, &anthropic.sonnet_model, &assembled.system, &assembled.user_content, collect_tx, Some(&req.script_id));

    let relay = async {
        while let Some(event) = collect_rx.recv().await {
            if let StreamEvent::TextDelta { text } = &event {
                full_answer.push_str(text);
            }
            if answer_tx.send(event).await.is_err() {
                break;
            }
        }
    };

    let (synth_result, _) = tokio::join!(synth, relay);
    synth_result?;

    conversations.record_message(&key, ConvRole::Assistant, &full_answer, None, Some(&anthropic.sonnet_model))?;
    conversations.note_reference(&key, None, &[], None, Some(intent_label(classified_intent)), None)?;

    // Compact the conversation's running summary once the message count
    // crosses the configured threshold (spec §3 `ConversationSummary`).
    compact::maybe_compact(conversations, llm, &anthropic.haiku_model, &key, cfg.thresholds.conversation_summary_message_threshold).await?;

    Ok(ChatMetadata {
        intent: classified_intent,
        topic_mode: topic.mode,
        topic_confidence: topic.confidence,
        iterations_used: outcome.iterations_used,
    })
}

fn intent_label(intent: Intent) -> &'static str {
    match intent {
        Intent::LocalEdit => "local_edit",
        Intent::SceneFeedback => "scene_feedback",
        Intent::GlobalQuestion => "global_question",
        Intent::Brainstorm => "brainstorm",
    }
}
