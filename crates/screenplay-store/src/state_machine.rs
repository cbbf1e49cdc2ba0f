//! State Machine (C11, spec §4.11).
//!
//! Pure transition logic colocated with the store that owns the rows it
//! reads — transitions are monotonic forward and driven entirely by
//! scene/page counts, so there's no separate background actor for it.

use rusqlite::params;
use screenplay_core::types::AnalysisState;

use crate::error::Result;
use crate::repository::ScriptRepository;

/// Words per page estimate used to size `empty`→`partial`→`analyzed`
/// transitions (spec §4.11: "page count is estimated by total
/// word-count / 220 rounded up").
const WORDS_PER_PAGE: f64 = 220.0;

fn estimate_page_count(total_words: u64) -> u64 {
    ((total_words as f64) / WORDS_PER_PAGE).ceil() as u64
}

fn next_state(current: AnalysisState, scene_count: u64, page_count: u64) -> AnalysisState {
    match current {
        AnalysisState::Empty if scene_count >= 3 || page_count >= 10 => AnalysisState::Partial,
        AnalysisState::Partial if scene_count >= 30 || page_count >= 60 => AnalysisState::Analyzed,
        other => other,
    }
}

impl ScriptRepository {
    /// Inspects scene and page counts and advances the script's state if
    /// the thresholds fire (spec §4.11). Transitions are monotonic
    /// forward only — never called to move a script backward.
    pub fn advance_script_state(&self, script_id: &str) -> Result<AnalysisState> {
        let script = self.get_script(script_id)?;
        let scenes = self.list_scenes(script_id)?;
        let scene_count = scenes.len() as u64;
        let total_words: u64 = scenes
            .iter()
            .flat_map(|s| &s.blocks)
            .map(|b| b.text.split_whitespace().count() as u64)
            .sum();
        let page_count = estimate_page_count(total_words);

        let new_state = next_state(script.analysis_state, scene_count, page_count);
        if new_state == script.analysis_state {
            return Ok(new_state);
        }

        let db = self.lock();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "UPDATE scripts SET analysis_state = ?1, last_state_transition = ?2, updated_at = ?2 WHERE id = ?3",
            params![new_state.to_string(), now, script_id],
        )?;
        Ok(new_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_to_partial_at_three_scenes() {
        assert_eq!(next_state(AnalysisState::Empty, 3, 0), AnalysisState::Partial);
        assert_eq!(next_state(AnalysisState::Empty, 2, 0), AnalysisState::Empty);
    }

    #[test]
    fn empty_to_partial_at_ten_pages_regardless_of_scene_count() {
        assert_eq!(next_state(AnalysisState::Empty, 0, 10), AnalysisState::Partial);
    }

    #[test]
    fn partial_to_analyzed_at_thirty_scenes_or_sixty_pages() {
        assert_eq!(next_state(AnalysisState::Partial, 30, 0), AnalysisState::Analyzed);
        assert_eq!(next_state(AnalysisState::Partial, 0, 60), AnalysisState::Analyzed);
        assert_eq!(next_state(AnalysisState::Partial, 29, 59), AnalysisState::Partial);
    }

    #[test]
    fn analyzed_never_regresses() {
        assert_eq!(next_state(AnalysisState::Analyzed, 0, 0), AnalysisState::Analyzed);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(estimate_page_count(221), 2);
        assert_eq!(estimate_page_count(220), 1);
        assert_eq!(estimate_page_count(0), 0);
    }
}
