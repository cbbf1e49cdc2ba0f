//! TopicModeDetector (spec §4.8, §8 property 9, scenarios S5).
//!
//! Heuristic classification into {FOLLOW_UP, NEW_TOPIC} with a
//! confidence score, evaluated as an ordered rule list — the first rule
//! that matches wins.

use screenplay_core::types::TopicMode;

const NEW_TOPIC_PHRASES: &[&str] = &["new question", "different topic", "switching topics", "unrelated", "by the way"];
const FOLLOW_UP_PHRASES: &[&str] = &[
    "also",
    "and",
    "additionally",
    "what about",
    "can you also",
    "similarly",
    "in addition",
];
const LEADING_PRONOUNS: &[&str] = &["it", "they", "that", "this", "those", "these", "he", "she"];
const STOPWORD_CAPS: &[&str] = &["The", "This", "That", "What", "How", "Why", "When", "Where", "Scene"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopicDetection {
    pub mode: TopicMode,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy)]
pub enum TopicOverride {
    Continue,
    NewTopic,
}

/// Runs the ordered rule list (spec §4.8). `last_assistant_message` is
/// `None` when there is no prior assistant turn.
pub fn detect(message: &str, last_assistant_message: Option<&str>, override_: Option<TopicOverride>) -> TopicDetection {
    if let Some(o) = override_ {
        return match o {
            TopicOverride::Continue => TopicDetection { mode: TopicMode::FollowUp, confidence: 1.0 },
            TopicOverride::NewTopic => TopicDetection { mode: TopicMode::NewTopic, confidence: 1.0 },
        };
    }

    // Rule 1: no prior assistant message.
    let Some(last) = last_assistant_message else {
        return TopicDetection { mode: TopicMode::NewTopic, confidence: 1.0 };
    };

    let lower = message.to_lowercase();

    // Rule 2: explicit new-topic phrases.
    if NEW_TOPIC_PHRASES.iter().any(|p| lower.contains(p)) {
        return TopicDetection { mode: TopicMode::NewTopic, confidence: 0.9 };
    }

    // Rule 3: follow-up phrases minus new-topic phrases > 1 (new-topic
    // phrases are already excluded by rule 2 firing first, so this
    // degenerates to: follow-up phrase count > 1 ⇒ FOLLOW_UP; the
    // inverse (a single or zero follow-up phrase outweighed by implicit
    // new-topic signal) ⇒ NEW_TOPIC).
    let follow_up_count = FOLLOW_UP_PHRASES.iter().filter(|p| lower.contains(**p)).count();
    if follow_up_count > 1 {
        return TopicDetection { mode: TopicMode::FollowUp, confidence: 0.9 };
    }

    // Rule 4: starts with a referential pronoun.
    let first_word = lower.split_whitespace().next().unwrap_or("").trim_matches(|c: char| !c.is_alphanumeric());
    if LEADING_PRONOUNS.contains(&first_word) {
        return TopicDetection { mode: TopicMode::FollowUp, confidence: 0.7 };
    }

    // Rule 5: mid-sentence referential demonstrative.
    for word in ["this ", "that "] {
        if lower.matches(word).count() > 0 && !lower.starts_with(word.trim()) {
            return TopicDetection { mode: TopicMode::FollowUp, confidence: 0.65 };
        }
    }

    // Rule 6: question addressing the assistant.
    if lower.contains('?') && (lower.contains("you ") || lower.contains("your ") || lower.contains("to you")) {
        return TopicDetection { mode: TopicMode::FollowUp, confidence: 0.75 };
    }

    // Rule 7: scene-number overlap with the last assistant message.
    if scene_numbers(message).iter().any(|n| scene_numbers(last).contains(n)) {
        return TopicDetection { mode: TopicMode::FollowUp, confidence: 0.8 };
    }

    // Rule 8: ≥2 overlapping capitalized tokens.
    if overlapping_capitalized_tokens(message, last) >= 2 {
        return TopicDetection { mode: TopicMode::FollowUp, confidence: 0.6 };
    }

    // Rule 9: short message.
    if message.split_whitespace().count() < 8 {
        return TopicDetection { mode: TopicMode::FollowUp, confidence: 0.7 };
    }

    // Rule 10: default bias toward continuity.
    TopicDetection { mode: TopicMode::FollowUp, confidence: 0.5 }
}

fn scene_numbers(text: &str) -> Vec<u32> {
    let lower = text.to_lowercase();
    let mut numbers = Vec::new();
    let mut words = lower.split_whitespace().peekable();
    while let Some(word) = words.next() {
        if word == "scene" {
            if let Some(next) = words.peek() {
                let digits: String = next.chars().take_while(|c| c.is_ascii_digit()).collect();
                if let Ok(n) = digits.parse::<u32>() {
                    numbers.push(n);
                }
            }
        }
    }
    numbers
}

fn overlapping_capitalized_tokens(a: &str, b: &str) -> usize {
    let tokens_a: std::collections::HashSet<&str> = a
        .split_whitespace()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()) && !STOPWORD_CAPS.contains(w))
        .collect();
    let tokens_b: std::collections::HashSet<&str> = b
        .split_whitespace()
        .filter(|w| w.chars().next().is_some_and(|c| c.is_uppercase()) && !STOPWORD_CAPS.contains(w))
        .collect();
    tokens_a.intersection(&tokens_b).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Spec §8 property 9(a).
    #[test]
    fn empty_history_is_new_topic_at_full_confidence() {
        let d = detect("What happens in act 3?", None, None);
        assert_eq!(d.mode, TopicMode::NewTopic);
        assert_eq!(d.confidence, 1.0);
    }

    /// Spec §8 property 9(b).
    #[test]
    fn explicit_new_question_phrase_is_new_topic() {
        let d = detect("new question about act 3", Some("Scene 3 needs more tension."), None);
        assert_eq!(d.mode, TopicMode::NewTopic);
        assert!(d.confidence >= 0.9);
    }

    /// Spec §8 property 9(c).
    #[test]
    fn pronoun_led_message_is_follow_up_at_point_seven() {
        let d = detect("it feels rushed to me", Some("Scene 3 needs more tension."), None);
        assert_eq!(d.mode, TopicMode::FollowUp);
        assert_eq!(d.confidence, 0.7);
    }

    /// Spec §8 property 9(d) / scenario S5.
    #[test]
    fn scene_number_overlap_is_follow_up_at_point_eight() {
        let d = detect("What about Scene 3's ending?", Some("Scene 3 needs more tension"), None);
        assert_eq!(d.mode, TopicMode::FollowUp);
        assert_eq!(d.confidence, 0.8);
    }

    #[test]
    fn override_bypasses_detection() {
        let d = detect("new question", Some("prior"), Some(TopicOverride::Continue));
        assert_eq!(d.mode, TopicMode::FollowUp);
        assert_eq!(d.confidence, 1.0);
    }
}
