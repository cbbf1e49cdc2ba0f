//! Content hashing for staleness detection (spec §4.1, C1).
//!
//! Pure functions, no I/O. A scene's stored `content_hash` is compared
//! against `hash(scene_text(scene))` on every read path that cares about
//! staleness — summaries, character sheets, embeddings, and the outline
//! all key their "needs refresh" check off this.

use crate::types::{Block, BlockType};
use sha2::{Digest, Sha256};

/// Normalizes screenplay text before hashing so that formatting noise
/// (trailing spaces, blank-line padding, case differences introduced by
/// autocapitalization) doesn't register as a content change.
///
/// Steps: lowercase, strip leading/trailing whitespace per line, drop
/// blank lines entirely, then rejoin with `\n`.
pub fn normalize(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

/// SHA-256 of the normalized text, hex-encoded.
pub fn hash(text: &str) -> String {
    let normalized = normalize(text);
    let digest = Sha256::digest(normalized.as_bytes());
    hex::encode(digest)
}

/// Concatenates a scene's blocks into the text used for hashing, falling
/// back to `raw_text` and then `heading` when blocks don't yield any text
/// (spec §4.1: scenes ingested without structured blocks still need a
/// well-defined hash surface).
///
/// Only `text` fields participate — block type and metadata are not part
/// of the hashed surface, so re-tagging a block (e.g. `action` to
/// `general`) without changing its text does not count as a content
/// change. Blocks are joined with a newline so that two adjacent blocks
/// whose text differs only in a removed/added trailing word at the
/// boundary still hash differently.
pub fn scene_text(blocks: &[Block], raw_text: Option<&str>, heading: &str) -> String {
    let mut out = String::new();
    collect_text(blocks, &mut out);
    if !out.is_empty() {
        return out;
    }
    match raw_text {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => heading.to_string(),
    }
}

fn collect_text(blocks: &[Block], out: &mut String) {
    for block in blocks {
        if !block.text.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&block.text);
        }
        if !block.children.is_empty() {
            collect_text(&block.children, out);
        }
    }
}

/// Computes the content hash for a scene's current blocks in one call,
/// falling back to `raw_text` then `heading` per `scene_text`.
pub fn scene_hash(blocks: &[Block], raw_text: Option<&str>, heading: &str) -> String {
    hash(&scene_text(blocks, raw_text, heading))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(block_type: BlockType, text: &str) -> Block {
        Block::new(block_type, text)
    }

    /// Scenario S1 (spec §8): whitespace-only changes to a scene heading
    /// must not change the hash, but an actual wording change must.
    #[test]
    fn whitespace_only_change_preserves_hash() {
        let a = vec![block(BlockType::SceneHeading, "INT. KITCHEN - DAY")];
        let b = vec![block(BlockType::SceneHeading, "  INT. KITCHEN - DAY  ")];
        assert_eq!(scene_hash(&a, None, ""), scene_hash(&b, None, ""));
    }

    #[test]
    fn blank_line_padding_does_not_change_hash() {
        let a = vec![
            block(BlockType::Action, "She walks in."),
            block(BlockType::Action, ""),
            block(BlockType::Action, "He looks up."),
        ];
        let b = vec![
            block(BlockType::Action, "She walks in."),
            block(BlockType::Action, "He looks up."),
        ];
        assert_eq!(scene_hash(&a, None, ""), scene_hash(&b, None, ""));
    }

    #[test]
    fn wording_change_changes_hash() {
        let a = vec![block(BlockType::Action, "She walks in.")];
        let b = vec![block(BlockType::Action, "She storms in.")];
        assert_ne!(scene_hash(&a, None, ""), scene_hash(&b, None, ""));
    }

    #[test]
    fn retagging_without_text_change_preserves_hash() {
        let a = vec![block(BlockType::Action, "FADE IN.")];
        let b = vec![block(BlockType::General, "FADE IN.")];
        assert_eq!(scene_hash(&a, None, ""), scene_hash(&b, None, ""));
    }

    #[test]
    fn case_change_does_not_change_hash() {
        let a = vec![block(BlockType::Dialogue, "I can't believe this.")];
        let b = vec![block(BlockType::Dialogue, "I CAN'T BELIEVE THIS.")];
        assert_eq!(scene_hash(&a, None, ""), scene_hash(&b, None, ""));
    }

    #[test]
    fn nested_children_contribute_to_hash() {
        let mut parent = block(BlockType::Character, "JANE");
        parent.children = vec![block(BlockType::Dialogue, "We need to talk.")];
        let hash_with_child = scene_hash(&[parent.clone()], None, "");

        parent.children.clear();
        let hash_without_child = scene_hash(&[parent], None, "");

        assert_ne!(hash_with_child, hash_without_child);
    }

    #[test]
    fn hash_is_deterministic() {
        let blocks = vec![block(BlockType::SceneHeading, "EXT. PARK - NIGHT")];
        assert_eq!(scene_hash(&blocks, None, ""), scene_hash(&blocks, None, ""));
    }

    /// Spec §4.1 fallback chain: no blocks falls back to `raw_text`.
    #[test]
    fn empty_blocks_falls_back_to_raw_text() {
        let hash_a = scene_hash(&[], Some("Some loose scene text."), "INT. KITCHEN - DAY");
        let hash_b = scene_hash(&[], Some("Some loose scene text."), "EXT. PARK - NIGHT");
        assert_eq!(hash_a, hash_b, "raw_text should win over heading when present");
        assert_eq!(hash_a, hash("Some loose scene text."));
    }

    /// Spec §4.1 fallback chain: no blocks and no raw_text falls back to
    /// `heading`.
    #[test]
    fn empty_blocks_and_raw_text_falls_back_to_heading() {
        let hash_a = scene_hash(&[], None, "INT. KITCHEN - DAY");
        let hash_b = scene_hash(&[], Some("   "), "INT. KITCHEN - DAY");
        assert_eq!(hash_a, hash("INT. KITCHEN - DAY"));
        assert_eq!(hash_a, hash_b, "blank raw_text should fall through to heading");
    }
}
