//! Tool loop (spec §4.8): iterates up to 5 rounds of tool calls, then runs
//! EvidenceBuilder over everything gathered and issues one final synthesis
//! completion the model must ground its answer in.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::client::LlmClient;
use crate::error::Result;
use crate::provider::{ChatRequest, Message, Role, ToolCall};
use crate::stream::StreamEvent;

use super::evidence::{self, Evidence, ToolResultInput};
use super::tools::Tool;

const MAX_ITERATIONS: usize = 5;

pub struct ToolLoopOutcome {
    pub evidence: Evidence,
    pub raw_messages: Vec<serde_json::Value>,
    pub iterations_used: usize,
}

/// Runs the tool-calling loop for one chat turn. `system`/`messages` seed
/// the conversation; each round the model may respond with tool-use
/// content blocks, which are executed against `catalog` and fed back as
/// `tool_result` blocks. The loop stops early once the model responds
/// with no tool calls, or after `MAX_ITERATIONS` rounds.
pub async fn run(
    llm: &Arc<LlmClient>,
    model: &str,
    system: &str,
    seed_messages: Vec<Message>,
    catalog: &[Box<dyn Tool>],
    question: &str,
    script_id: Option<&str>,
) -> Result<ToolLoopOutcome> {
    let tool_defs = super::tools::to_definitions(catalog);
    let mut raw_messages: Vec<serde_json::Value> = seed_messages
        .iter()
        .map(|m| serde_json::json!({ "role": role_str(m.role), "content": m.content }))
        .collect();
    let mut collected: Vec<ToolResultInput> = Vec::new();
    let mut iterations_used = 0;

    for iteration in 0..MAX_ITERATIONS {
        iterations_used = iteration + 1;

        let mut req = ChatRequest::new(model, system, seed_messages.clone(), 2048);
        req.tools = tool_defs.clone();
        req.raw_messages = Some(raw_messages.clone());

        let resp = llm.complete(&req, "CHAT_TOOL_CALL", script_id, Some(iteration as i64), None).await?;

        if resp.tool_calls.is_empty() {
            raw_messages.push(serde_json::json!({ "role": "assistant", "content": resp.content }));
            break;
        }

        raw_messages.push(assistant_tool_use_message(&resp.content, &resp.tool_calls));

        let mut tool_result_blocks = Vec::new();
        for call in &resp.tool_calls {
            let result = execute_tool(catalog, call).await;
            collected.push(ToolResultInput { tool_name: call.name.clone(), input: call.input.clone(), text: result.content.clone() });
            tool_result_blocks.push(serde_json::json!({
                "type": "tool_result",
                "tool_use_id": call.id,
                "content": result.content,
                "is_error": result.is_error,
            }));
        }
        raw_messages.push(serde_json::json!({ "role": "user", "content": tool_result_blocks }));
    }

    let evidence = evidence::build(question, &collected, None);
    Ok(ToolLoopOutcome { evidence, raw_messages, iterations_used })
}

/// Final grounded synthesis call, streamed to the caller (spec §4.8:
/// "Streaming synthesis yields text chunks to the caller").
pub async fn synthesize_stream(
    llm: &Arc<LlmClient>,
    model: &str,
    system: &str,
    user_content: &str,
    tx: mpsc::Sender<StreamEvent>,
    script_id: Option<&str>,
) -> Result<()> {
    let req = ChatRequest::new(model, system, vec![Message { role: Role::User, content: user_content.to_string() }], 4096);
    llm.stream_complete(&req, "CHAT_SYNTHESIS", tx, script_id).await
}

async fn execute_tool(catalog: &[Box<dyn Tool>], call: &ToolCall) -> super::tools::ToolResult {
    match catalog.iter().find(|t| t.name() == call.name) {
        Some(tool) => tool.execute(call.input.clone()).await,
        None => super::tools::ToolResult::error(format!("Error: unknown tool '{}'", call.name)),
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::System => "system",
    }
}

fn assistant_tool_use_message(text: &str, calls: &[ToolCall]) -> serde_json::Value {
    let mut content = Vec::new();
    if !text.is_empty() {
        content.push(serde_json::json!({ "type": "text", "text": text }));
    }
    for call in calls {
        content.push(serde_json::json!({ "type": "tool_use", "id": call.id, "name": call.name, "input": call.input }));
    }
    serde_json::json!({ "role": "assistant", "content": content })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assistant_tool_use_message_includes_text_and_calls() {
        let calls = vec![ToolCall { id: "t1".into(), name: "get_outline".into(), input: serde_json::json!({}) }];
        let msg = assistant_tool_use_message("checking the outline", &calls);
        let content = msg.get("content").unwrap().as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["name"], "get_outline");
    }

    #[test]
    fn role_str_maps_all_variants() {
        assert_eq!(role_str(Role::User), "user");
        assert_eq!(role_str(Role::Assistant), "assistant");
        assert_eq!(role_str(Role::System), "system");
    }
}
