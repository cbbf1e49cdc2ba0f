//! EvidenceBuilder (spec §4.8, §8 property 10).
//!
//! Turns raw tool-call results into a ranked, budget-truncated bundle
//! used to ground the synthesis prompt.

const MAX_ITEM_BYTES: usize = 4096;
const DEFAULT_MAX_ITEMS: usize = 5;
const SCENE_MARKER_PREFIX: &str = "--- SCENE ";

#[derive(Debug, Clone)]
pub struct ToolResultInput {
    pub tool_name: String,
    pub input: serde_json::Value,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct EvidenceItem {
    pub source_tool: String,
    pub scene_numbers: Vec<i64>,
    pub content: String,
    pub char_count: usize,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct Evidence {
    pub question: String,
    pub items: Vec<EvidenceItem>,
    pub truncated: bool,
    pub original_item_count: usize,
}

pub fn build(question: &str, results: &[ToolResultInput], max_items: Option<usize>) -> Evidence {
    let max_items = max_items.unwrap_or(DEFAULT_MAX_ITEMS);
    let query_tokens = tokenize(question);

    let mut items: Vec<EvidenceItem> = Vec::new();
    for result in results {
        if result.text.is_empty() || result.text.starts_with("Error:") {
            continue;
        }
        for (scene_numbers, content) in split_scene_batches(&result.text) {
            let score = relevance_score(&query_tokens, &content, &scene_numbers);
            items.push(EvidenceItem {
                source_tool: result.tool_name.clone(),
                scene_numbers,
                char_count: content.chars().count(),
                content: truncate_item(&content),
                score,
            });
        }
    }

    let original_item_count = items.len();
    items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    let truncated = items.len() > max_items;
    items.truncate(max_items);

    Evidence { question: question.to_string(), items, truncated, original_item_count }
}

/// Splits a batch tool result into one item per scene, when the result
/// contains `--- SCENE N (index, heading) ---` markers; otherwise the
/// whole text is one item with no associated scene numbers.
fn split_scene_batches(text: &str) -> Vec<(Vec<i64>, String)> {
    if !text.contains(SCENE_MARKER_PREFIX) {
        return vec![(Vec::new(), text.to_string())];
    }

    let mut out = Vec::new();
    let mut rest = text;
    while let Some(marker_start) = rest.find(SCENE_MARKER_PREFIX) {
        let after_marker = &rest[marker_start + SCENE_MARKER_PREFIX.len()..];
        let marker_end = after_marker.find("---").unwrap_or(after_marker.len());
        let header = &after_marker[..marker_end];
        let scene_number: Vec<i64> = header
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .next()
            .and_then(|s| s.parse().ok())
            .into_iter()
            .collect();

        let body_start = marker_start + SCENE_MARKER_PREFIX.len() + marker_end + 3;
        let body = &rest[body_start.min(rest.len())..];
        let next_marker = body.find(SCENE_MARKER_PREFIX).unwrap_or(body.len());
        out.push((scene_number, body[..next_marker].trim().to_string()));
        rest = &body[next_marker..];
        if next_marker == body.len() {
            break;
        }
    }
    out
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_string())
        .collect()
}

fn relevance_score(query_tokens: &[String], content: &str, scene_numbers: &[i64]) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let content_lower = content.to_lowercase();
    let matches = query_tokens.iter().filter(|t| content_lower.contains(t.as_str())).count();
    let mut score = matches as f64 / query_tokens.len() as f64;

    let query_scene_numbers = explicit_scene_numbers(query_tokens);
    if scene_numbers.iter().any(|n| query_scene_numbers.contains(n)) {
        score += 0.1;
    }
    score
}

fn explicit_scene_numbers(tokens: &[String]) -> Vec<i64> {
    tokens.iter().filter_map(|t| t.parse::<i64>().ok()).collect()
}

fn truncate_item(content: &str) -> String {
    if content.len() <= MAX_ITEM_BYTES {
        return content.to_string();
    }
    let mut end = MAX_ITEM_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}[truncated]", &content[..end])
}

/// Renders the evidence block for prompt inclusion (spec §4.8: `[i] From
/// <tool> (Scenes: a, b): <content>`, plus an omitted-count footer).
pub fn render(evidence: &Evidence) -> String {
    let mut out = String::new();
    for (i, item) in evidence.items.iter().enumerate() {
        let scenes = if item.scene_numbers.is_empty() {
            "none".to_string()
        } else {
            item.scene_numbers.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
        };
        out.push_str(&format!("[{}] From {} (Scenes: {}): {}\n", i + 1, item.source_tool, scenes, item.content));
    }
    if evidence.truncated {
        let omitted = evidence.original_item_count - evidence.items.len();
        out.push_str(&format!("{omitted} lower-relevance results omitted\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(tool: &str, text: &str) -> ToolResultInput {
        ToolResultInput { tool_name: tool.to_string(), input: serde_json::json!({}), text: text.to_string() }
    }

    /// Spec §8 property 10.
    #[test]
    fn fully_matching_item_outranks_non_matching_item() {
        let results = vec![
            result("get_scene", "the detective confronts the killer in the rain"),
            result("get_scene", "a quiet morning with coffee and birdsong"),
        ];
        let evidence = build("who confronts the killer", &results, None);
        assert!(evidence.items[0].content.contains("confronts the killer"));
    }

    #[test]
    fn empty_and_error_results_are_dropped() {
        let results = vec![result("get_scene", ""), result("get_scene", "Error: not found"), result("get_scene", "valid content")];
        let evidence = build("valid", &results, None);
        assert_eq!(evidence.items.len(), 1);
    }

    #[test]
    fn batch_results_split_per_scene_marker() {
        let text = "--- SCENE 1 (0, INT. HOUSE) ---\na quiet kitchen\n--- SCENE 2 (1, EXT. STREET) ---\nrain falls on the street";
        let results = vec![result("get_scenes", text)];
        let evidence = build("street", &results, None);
        assert_eq!(evidence.original_item_count, 2);
        assert_eq!(evidence.items[0].scene_numbers, vec![2]);
    }

    #[test]
    fn items_beyond_max_are_marked_truncated() {
        let results: Vec<_> = (0..10).map(|i| result("get_scene", &format!("scene content number {i} matches query"))).collect();
        let evidence = build("matches query", &results, Some(3));
        assert_eq!(evidence.items.len(), 3);
        assert!(evidence.truncated);
    }
}
