use serde::{Deserialize, Serialize};

use crate::error::{ConversationError, Result};

/// Identifies one chat conversation: a user talking about one script.
/// Unlike the multi-agent `user:{user}:agent:{agent}:{name}` keys this
/// crate's teacher used, a screenplay conversation only ever has one
/// counterpart (the assistant) and one scope (the script), so the key
/// collapses to two parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    pub script_id: String,
    pub user_id: String,
}

impl ConversationKey {
    pub fn new(script_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { script_id: script_id.into(), user_id: user_id.into() }
    }

    pub fn format(&self) -> String {
        format!("script:{}:user:{}", self.script_id, self.user_id)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("script:")
            .ok_or_else(|| ConversationError::InvalidKey(format!("missing 'script:' prefix: {s}")))?;
        let marker = ":user:";
        let pos = rest
            .find(marker)
            .ok_or_else(|| ConversationError::InvalidKey(format!("missing ':user:' segment: {s}")))?;
        let script_id = &rest[..pos];
        let user_id = &rest[pos + marker.len()..];
        if script_id.is_empty() || user_id.is_empty() {
            return Err(ConversationError::InvalidKey(format!("key components must not be empty: {s}")));
        }
        Ok(Self { script_id: script_id.to_string(), user_id: user_id.to_string() })
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format())
    }
}

/// Role of a chat turn. The spec's own data model is ambivalent between
/// `role` and `sender` terminology for this column (an open question,
/// resolved in DESIGN.md) — `role` was picked since it matches the
/// three-way `user`/`assistant`/`system` vocabulary the LLM client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = ConversationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(ConversationError::InvalidKey(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub script_id: String,
    pub user_id: String,
    pub role: Role,
    pub content: String,
    pub token_count: Option<i64>,
    pub model: Option<String>,
    pub created_at: String,
}

/// Short-term conversation memory (spec §4.8, §9: last-N scenes,
/// characters, and plot threads referenced, the last classified
/// intent, and any open commitment the assistant made).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    pub script_id: String,
    pub user_id: String,
    pub last_scene_ids: Vec<String>,
    pub last_characters: Vec<String>,
    pub last_thread_ids: Vec<String>,
    pub last_intent: Option<String>,
    pub last_commitment: Option<String>,
    pub message_count: i64,
    pub updated_at: String,
}

impl ConversationState {
    pub fn empty(script_id: &str, user_id: &str, now: &str) -> Self {
        Self {
            script_id: script_id.to_string(),
            user_id: user_id.to_string(),
            last_scene_ids: Vec::new(),
            last_characters: Vec::new(),
            last_thread_ids: Vec::new(),
            last_intent: None,
            last_commitment: None,
            message_count: 0,
            updated_at: now.to_string(),
        }
    }
}

/// A rolling-compression summary covering chat history older than the
/// retained window (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub script_id: String,
    pub user_id: String,
    pub summary_text: String,
    pub covered_through_message_id: Option<String>,
    pub created_at: String,
}

/// Cap applied when pushing a new reference onto a `last_*` ring
/// (spec §9: bounded short-term memory, most-recent-first).
pub const LAST_N_CAP: usize = 5;

pub fn push_capped(list: &mut Vec<String>, item: String) {
    list.retain(|existing| existing != &item);
    list.insert(0, item);
    list.truncate(LAST_N_CAP);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_key_round_trips() {
        let key = ConversationKey::new("script-1", "user-1");
        let parsed = ConversationKey::parse(&key.format()).unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn push_capped_dedupes_and_caps_at_five() {
        let mut list = vec!["a".to_string(), "b".to_string()];
        push_capped(&mut list, "a".to_string());
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);

        for i in 0..10 {
            push_capped(&mut list, format!("x{i}"));
        }
        assert_eq!(list.len(), LAST_N_CAP);
        assert_eq!(list[0], "x9");
    }
}
