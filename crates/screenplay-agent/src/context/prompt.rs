//! PromptAssembler (spec §4.8).
//!
//! Composes a budgeted prompt from intent, topic mode, retrieval output,
//! conversation context, and an optional evidence block. Token counts
//! here are estimated by whitespace-word count — good enough for budget
//! trimming, not a tokenizer-exact count (spec doesn't mandate one).

use screenplay_core::config::BudgetsConfig;
use screenplay_core::types::{BudgetTier, Intent, TopicMode};

use super::evidence::{render as render_evidence, Evidence};
use crate::retrieval::RetrievalResult;

pub struct PromptInputs<'a> {
    pub intent: Intent,
    pub topic_mode: TopicMode,
    pub retrieval: &'a RetrievalResult,
    pub conversation_text: &'a str,
    pub evidence: Option<&'a Evidence>,
    pub global_context: &'a str,
    pub system_prompt: &'a str,
}

pub struct AssembledPrompt {
    pub system: String,
    pub user_content: String,
}

fn budget_for(tier: BudgetTier, cfg: &BudgetsConfig) -> u32 {
    match tier {
        BudgetTier::Quick => cfg.quick_tokens,
        BudgetTier::Standard => cfg.standard_tokens,
        BudgetTier::Deep => cfg.deep_tokens,
    }
}

/// Section allocation for the `standard` tier (spec §4.8): system 600,
/// global context 900, retrieval 2500, conversation 400 (0 for
/// NEW_TOPIC), evidence 1500, headroom 100. Other tiers scale every
/// section proportionally to the tier's total budget.
struct SectionBudgets {
    system: u32,
    global_context: u32,
    retrieval: u32,
    conversation: u32,
    evidence: u32,
}

fn section_budgets(_tier: BudgetTier, total: u32, topic_mode: TopicMode) -> SectionBudgets {
    const STANDARD_TOTAL: f64 = 5000.0;
    let scale = total as f64 / STANDARD_TOTAL;
    let conversation_base = if topic_mode == TopicMode::NewTopic { 0.0 } else { 400.0 };
    SectionBudgets {
        system: (600.0 * scale) as u32,
        global_context: (900.0 * scale) as u32,
        retrieval: (2500.0 * scale) as u32,
        conversation: (conversation_base * scale) as u32,
        evidence: (1500.0 * scale) as u32,
    }
}

fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

fn trim_to_words(text: &str, max_words: u32) -> String {
    if max_words == 0 {
        return String::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() as u32 <= max_words {
        return text.to_string();
    }
    words[..max_words as usize].join(" ")
}

fn render_retrieval(retrieval: &RetrievalResult) -> String {
    let mut out = String::new();
    if let Some(outline) = &retrieval.outline {
        if retrieval.outline_is_stale {
            out.push_str("[outline is stale, regeneration pending]\n");
        }
        out.push_str(&outline.summary_text);
        out.push('\n');
    }
    for sheet in &retrieval.character_sheets {
        out.push_str(&format!("Character {}: {}\n", sheet.character_name, sheet.summary_text));
    }
    for scored in &retrieval.scenes {
        let heading = &scored.scene.heading;
        let summary = scored.summary.as_ref().map(|s| s.summary_text.as_str()).unwrap_or("");
        out.push_str(&format!("Scene {} ({}): {}\n", scored.scene.position, heading, summary));
    }
    out
}

/// Assembles the prompt, trimming overrunning sections in the order
/// spec §4.8 mandates: retrieval first, then conversation, then global
/// context.
pub fn assemble(tier: BudgetTier, cfg: &BudgetsConfig, inputs: &PromptInputs<'_>) -> AssembledPrompt {
    let total = budget_for(tier, cfg);
    let budgets = section_budgets(tier, total, inputs.topic_mode);

    let mut retrieval_text = render_retrieval(inputs.retrieval);
    let mut conversation_text = inputs.conversation_text.to_string();
    let mut global_context_text = inputs.global_context.to_string();
    // EvidenceBuilder already bounds this (4KB/item, at most max_items) —
    // this is only a last-resort cap, not part of the spec's trim order.
    let mut evidence_text = inputs.evidence.map(render_evidence).unwrap_or_default();

    if word_count(&retrieval_text) > budgets.retrieval {
        retrieval_text = trim_to_words(&retrieval_text, budgets.retrieval);
    }
    if word_count(&conversation_text) > budgets.conversation {
        conversation_text = trim_to_words(&conversation_text, budgets.conversation);
    }
    if word_count(&global_context_text) > budgets.global_context {
        global_context_text = trim_to_words(&global_context_text, budgets.global_context);
    }
    if word_count(&evidence_text) > budgets.evidence {
        evidence_text = trim_to_words(&evidence_text, budgets.evidence);
    }

    let system = trim_to_words(inputs.system_prompt, budgets.system.max(1));

    let mut user_content = String::new();
    if !global_context_text.is_empty() {
        user_content.push_str("# Script context\n");
        user_content.push_str(&global_context_text);
        user_content.push('\n');
    }
    if !retrieval_text.is_empty() {
        user_content.push_str("# Retrieved material\n");
        user_content.push_str(&retrieval_text);
        user_content.push('\n');
    }
    if !conversation_text.is_empty() {
        user_content.push_str("# Recent conversation\n");
        user_content.push_str(&conversation_text);
        user_content.push('\n');
    }
    if !evidence_text.is_empty() {
        user_content.push_str("# Evidence\n");
        user_content.push_str(&evidence_text);
        user_content.push('\n');
    }

    AssembledPrompt { system, user_content }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screenplay_core::types::BlockType;
    use screenplay_store::types::{Scene, ScriptOutline};

    fn cfg() -> BudgetsConfig {
        BudgetsConfig { quick_tokens: 1200, standard_tokens: 5000, deep_tokens: 20000 }
    }

    fn scene() -> Scene {
        Scene {
            id: "s1".into(),
            script_id: "script-1".into(),
            position: 1,
            heading: "INT. HOUSE - DAY".into(),
            blocks: vec![screenplay_core::types::Block::new(BlockType::Action, "hi")],
            version: 1,
            content_hash: None,
            is_key_scene: false,
            created_at: "now".into(),
            updated_at: "now".into(),
        }
    }

    #[test]
    fn new_topic_excludes_conversation_section() {
        let retrieval = RetrievalResult::default();
        let inputs = PromptInputs {
            intent: Intent::GlobalQuestion,
            topic_mode: TopicMode::NewTopic,
            retrieval: &retrieval,
            conversation_text: "some prior back and forth",
            evidence: None,
            global_context: "",
            system_prompt: "You are a screenwriting assistant.",
        };
        let assembled = assemble(BudgetTier::Standard, &cfg(), &inputs);
        assert!(!assembled.user_content.contains("Recent conversation"));
    }

    #[test]
    fn oversized_retrieval_section_is_trimmed() {
        let mut retrieval = RetrievalResult::default();
        retrieval.scenes.push(crate::retrieval::ScoredScene { scene: scene(), summary: None, score: 1.0 });
        let huge_outline = ScriptOutline {
            script_id: "script-1".into(),
            summary_text: "word ".repeat(10_000),
            token_estimate: 10_000,
            is_stale: false,
            dirty_scene_count: 0,
            version: 1,
            generated_at: None,
        };
        retrieval.outline = Some(huge_outline);
        let inputs = PromptInputs {
            intent: Intent::GlobalQuestion,
            topic_mode: TopicMode::FollowUp,
            retrieval: &retrieval,
            conversation_text: "",
            evidence: None,
            global_context: "",
            system_prompt: "sys",
        };
        let assembled = assemble(BudgetTier::Standard, &cfg(), &inputs);
        assert!(word_count(&assembled.user_content) < 10_000);
    }

    #[test]
    fn oversized_evidence_is_capped_as_last_resort() {
        let retrieval = RetrievalResult::default();
        let huge_evidence = Evidence {
            question: "what happened".into(),
            items: vec![super::super::evidence::EvidenceItem {
                source_tool: "get_scene".into(),
                scene_numbers: vec![1],
                content: "word ".repeat(5_000),
                char_count: 5_000 * 5,
                score: 1.0,
            }],
            truncated: false,
            original_item_count: 1,
        };
        let inputs = PromptInputs {
            intent: Intent::GlobalQuestion,
            topic_mode: TopicMode::FollowUp,
            retrieval: &retrieval,
            conversation_text: "",
            evidence: Some(&huge_evidence),
            global_context: "",
            system_prompt: "sys",
        };
        let assembled = assemble(BudgetTier::Standard, &cfg(), &inputs);
        assert!(word_count(&assembled.user_content) < 5_000);
    }
}
