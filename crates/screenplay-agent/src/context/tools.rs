//! Tool catalog for the chat tool loop (spec §4.8): {get_scene, get_scenes,
//! search_scenes, get_character_sheet, get_outline, analyze_pacing}.

use std::sync::Arc;

use async_trait::async_trait;

use screenplay_store::ScriptRepository;

use crate::provider::ToolDefinition;
use crate::retrieval::Retriever;

#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: false }
    }
    pub fn error(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_error: true }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> serde_json::Value;
    async fn execute(&self, input: serde_json::Value) -> ToolResult;
}

pub fn to_definitions(tools: &[Box<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
        .collect()
}

fn scene_block(position: i64, heading: &str, body: &str) -> String {
    format!("--- SCENE {position} ({position}, {heading}) ---\n{body}")
}

fn scene_body(scene: &screenplay_store::types::Scene, summary: Option<&screenplay_store::types::SceneSummary>) -> String {
    let mut out = String::new();
    if let Some(s) = summary {
        out.push_str(&s.summary_text);
        out.push('\n');
    }
    for block in &scene.blocks {
        out.push_str(&block.text);
        out.push('\n');
    }
    out
}

pub struct GetSceneTool {
    pub repo: Arc<ScriptRepository>,
    pub script_id: String,
}

#[async_trait]
impl Tool for GetSceneTool {
    fn name(&self) -> &str {
        "get_scene"
    }
    fn description(&self) -> &str {
        "Fetch one scene by its position within the script, including its summary and block text."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "position": { "type": "integer" } },
            "required": ["position"]
        })
    }
    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(position) = input.get("position").and_then(|v| v.as_i64()) else {
            return ToolResult::error("Error: missing 'position'");
        };
        let scenes = match self.repo.list_scenes(&self.script_id) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("Error: {e}")),
        };
        let Some(scene) = scenes.into_iter().find(|s| s.position == position) else {
            return ToolResult::error(format!("Error: no scene at position {position}"));
        };
        let summary = self.repo.get_scene_summary(&scene.id).ok().flatten();
        ToolResult::success(scene_block(scene.position, &scene.heading, &scene_body(&scene, summary.as_ref())))
    }
}

pub struct GetScenesTool {
    pub repo: Arc<ScriptRepository>,
    pub script_id: String,
}

#[async_trait]
impl Tool for GetScenesTool {
    fn name(&self) -> &str {
        "get_scenes"
    }
    fn description(&self) -> &str {
        "Fetch a contiguous range of scenes by position, each with its summary and block text."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "from_position": { "type": "integer" },
                "to_position": { "type": "integer" }
            },
            "required": ["from_position", "to_position"]
        })
    }
    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let from = input.get("from_position").and_then(|v| v.as_i64()).unwrap_or(0);
        let to = input.get("to_position").and_then(|v| v.as_i64()).unwrap_or(from);
        let scenes = match self.repo.list_scenes(&self.script_id) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("Error: {e}")),
        };
        let mut out = String::new();
        for scene in scenes.into_iter().filter(|s| s.position >= from && s.position <= to) {
            let summary = self.repo.get_scene_summary(&scene.id).ok().flatten();
            out.push_str(&scene_block(scene.position, &scene.heading, &scene_body(&scene, summary.as_ref())));
            out.push('\n');
        }
        if out.is_empty() {
            return ToolResult::error("Error: no scenes in that range");
        }
        ToolResult::success(out)
    }
}

pub struct SearchScenesTool {
    pub retriever: Arc<Retriever>,
    pub script_id: String,
}

#[async_trait]
impl Tool for SearchScenesTool {
    fn name(&self) -> &str {
        "search_scenes"
    }
    fn description(&self) -> &str {
        "Vector-search scenes by a free-text query, returning the most relevant matches."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "query": { "type": "string" }, "k": { "type": "integer" } },
            "required": ["query"]
        })
    }
    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(query) = input.get("query").and_then(|v| v.as_str()) else {
            return ToolResult::error("Error: missing 'query'");
        };
        let k = input.get("k").and_then(|v| v.as_u64()).unwrap_or(5) as usize;
        match self.retriever.vector_search(&self.script_id, query, k, crate::retrieval::GENERAL_THRESHOLD).await {
            Ok(hits) if hits.is_empty() => ToolResult::error("Error: no matching scenes"),
            Ok(hits) => {
                let mut out = String::new();
                for hit in hits {
                    out.push_str(&scene_block(hit.scene.position, &hit.scene.heading, &scene_body(&hit.scene, hit.summary.as_ref())));
                    out.push('\n');
                }
                ToolResult::success(out)
            }
            Err(e) => ToolResult::error(format!("Error: {e}")),
        }
    }
}

pub struct GetCharacterSheetTool {
    pub repo: Arc<ScriptRepository>,
    pub script_id: String,
}

#[async_trait]
impl Tool for GetCharacterSheetTool {
    fn name(&self) -> &str {
        "get_character_sheet"
    }
    fn description(&self) -> &str {
        "Fetch the character sheet (want/need, arc, relationships, pivotal moments) for a named character."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "character_name": { "type": "string" } },
            "required": ["character_name"]
        })
    }
    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let Some(name) = input.get("character_name").and_then(|v| v.as_str()) else {
            return ToolResult::error("Error: missing 'character_name'");
        };
        match self.repo.get_or_init_character_sheet(&self.script_id, name) {
            Ok(sheet) if sheet.summary_text.is_empty() => ToolResult::error(format!("Error: no sheet yet for {name}")),
            Ok(sheet) => ToolResult::success(sheet.summary_text),
            Err(e) => ToolResult::error(format!("Error: {e}")),
        }
    }
}

pub struct GetOutlineTool {
    pub repo: Arc<ScriptRepository>,
    pub script_id: String,
}

#[async_trait]
impl Tool for GetOutlineTool {
    fn name(&self) -> &str {
        "get_outline"
    }
    fn description(&self) -> &str {
        "Fetch the script's global outline summary."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        match self.repo.get_or_init_outline(&self.script_id) {
            Ok(outline) if outline.summary_text.is_empty() => ToolResult::error("Error: outline not yet generated"),
            Ok(outline) => ToolResult::success(outline.summary_text),
            Err(e) => ToolResult::error(format!("Error: {e}")),
        }
    }
}

pub struct AnalyzePacingTool {
    pub repo: Arc<ScriptRepository>,
    pub script_id: String,
}

#[async_trait]
impl Tool for AnalyzePacingTool {
    fn name(&self) -> &str {
        "analyze_pacing"
    }
    fn description(&self) -> &str {
        "Report rough scene-length pacing across the script (scene count and word counts per scene, in position order)."
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }
    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        let scenes = match self.repo.list_scenes(&self.script_id) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("Error: {e}")),
        };
        if scenes.is_empty() {
            return ToolResult::error("Error: script has no scenes");
        }
        let mut out = String::new();
        for scene in &scenes {
            let words: usize = scene.blocks.iter().map(|b| b.text.split_whitespace().count()).sum();
            out.push_str(&format!("Scene {} ({}): {} words\n", scene.position, scene.heading, words));
        }
        ToolResult::success(out)
    }
}

pub fn build_catalog(repo: Arc<ScriptRepository>, retriever: Arc<Retriever>, script_id: &str) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(GetSceneTool { repo: repo.clone(), script_id: script_id.to_string() }),
        Box::new(GetScenesTool { repo: repo.clone(), script_id: script_id.to_string() }),
        Box::new(SearchScenesTool { retriever, script_id: script_id.to_string() }),
        Box::new(GetCharacterSheetTool { repo: repo.clone(), script_id: script_id.to_string() }),
        Box::new(GetOutlineTool { repo: repo.clone(), script_id: script_id.to_string() }),
        Box::new(AnalyzePacingTool { repo, script_id: script_id.to_string() }),
    ]
}
