//! IntentClassifier (spec §4.8, §8 property 8).
//!
//! Keyword heuristic over four intent classes; message lowercased,
//! per-class score = count of matching phrases, unique maximum wins.
//! Ties or all-zero fall through to a small LLM classification call
//! (max 20 output tokens) — exposed as `classify_keywords` (pure,
//! unit-testable) plus an async `classify` that adds the LLM fallback.

use std::sync::Arc;

use screenplay_core::types::Intent;

use crate::client::LlmClient;
use crate::error::Result;
use crate::provider::{ChatRequest, Message, Role};

fn keyword_sets() -> [(Intent, &'static [&'static str]); 4] {
    [
        (
            Intent::LocalEdit,
            &[
                "rewrite this",
                "change this line",
                "fix this dialogue",
                "edit this scene",
                "reword",
                "tighten this",
                "make this shorter",
                "fix the typo",
            ],
        ),
        (
            Intent::SceneFeedback,
            &[
                "how does this scene",
                "feedback on this scene",
                "does this scene work",
                "is this scene",
                "critique this scene",
                "review this scene",
                "scene feel",
            ],
        ),
        (
            Intent::GlobalQuestion,
            &[
                "overall story",
                "throughout the script",
                "across the whole",
                "entire screenplay",
                "the whole story",
                "plot overall",
                "story arc",
            ],
        ),
        (
            Intent::Brainstorm,
            &[
                "brainstorm",
                "what if",
                "give me ideas",
                "pitch me",
                "alternative ending",
                "come up with",
                "spitball",
            ],
        ),
    ]
}

/// Pure keyword classification. Returns `None` on a tie or all-zero
/// score, leaving the LLM fallback to the caller.
pub fn classify_keywords(message: &str) -> Option<Intent> {
    let lower = message.to_lowercase();
    let mut scores: Vec<(Intent, usize)> = keyword_sets()
        .into_iter()
        .map(|(intent, phrases)| {
            let score = phrases.iter().filter(|p| lower.contains(*p)).count();
            (intent, score)
        })
        .collect();

    scores.sort_by(|a, b| b.1.cmp(&a.1));
    let (best_intent, best_score) = scores[0];
    if best_score == 0 {
        return None;
    }
    let tied = scores.iter().filter(|(_, s)| *s == best_score).count();
    if tied > 1 {
        return None;
    }
    Some(best_intent)
}

/// Full classifier: an explicit hint bypasses everything; otherwise try
/// the keyword heuristic, falling back to a cheap LLM call.
pub async fn classify(llm: &Arc<LlmClient>, haiku_model: &str, message: &str, hint: Option<Intent>, script_id: Option<&str>) -> Result<Intent> {
    if let Some(hint) = hint {
        return Ok(hint);
    }
    if let Some(intent) = classify_keywords(message) {
        return Ok(intent);
    }

    let req = ChatRequest::new(
        haiku_model,
        "Classify the user's message into exactly one of: local_edit, scene_feedback, global_question, brainstorm. \
         Respond with only the label, nothing else.",
        vec![Message { role: Role::User, content: message.to_string() }],
        20,
    );
    let resp = llm.complete(&req, "classify_intent", script_id, None, None).await?;
    Ok(parse_label(&resp.content))
}

fn parse_label(text: &str) -> Intent {
    let lower = text.trim().to_lowercase();
    if lower.contains("local_edit") {
        Intent::LocalEdit
    } else if lower.contains("scene_feedback") {
        Intent::SceneFeedback
    } else if lower.contains("global_question") {
        Intent::GlobalQuestion
    } else if lower.contains("brainstorm") {
        Intent::Brainstorm
    } else {
        Intent::GlobalQuestion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 property 8: every keyword phrase in the four sets
    /// classifies to its expected intent with no hint and no LLM call.
    #[test]
    fn every_keyword_phrase_classifies_to_its_intent() {
        for (intent, phrases) in keyword_sets() {
            for phrase in phrases {
                assert_eq!(classify_keywords(phrase), Some(intent), "phrase {phrase:?} should classify as {intent:?}");
            }
        }
    }

    #[test]
    fn unrelated_message_returns_none() {
        assert_eq!(classify_keywords("hello there, how are you"), None);
    }

    #[test]
    fn tie_returns_none() {
        assert_eq!(classify_keywords("rewrite this and brainstorm some ideas"), None);
    }
}
