//! PromptBuilder：会话日志 → 发给模型的消息序列
//!
//! system = 人设（含今天日期）+ 协议规则 + 信封 schema + 工具 schema；
//! 其后是满足 HistoryBudget 的最新日志后缀。Tool 轮重放为助手的调用信封加一条 TOOL_RESPONSE 用户消息。

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::memory::{ConversationLog, ConversationTurn, HistoryBudget, Message, Role, TokenEstimator};
use crate::tools::protocol::{CLARIFY_KEY, FINAL_ANSWER_KEY, TOOL_CALL_KEY};
use crate::tools::{tool_call_schema_json, ToolRegistry};

pub const TOOL_RESPONSE_PREFIX: &str = "TOOL_RESPONSE";

pub const DEFAULT_PERSONA: &str = "You are Smart Scheduler, a voice assistant that helps the user find \
and book meetings in their calendar. Keep replies short and conversational: they are read aloud.";

pub struct PromptBuilder {
    persona: String,
    tools_schema: String,
    envelope_schema: String,
    budget: HistoryBudget,
}

impl PromptBuilder {
    pub fn new(persona: impl Into<String>, registry: &ToolRegistry, budget: HistoryBudget) -> Self {
        Self {
            persona: persona.into(),
            tools_schema: registry.to_schema_json(),
            envelope_schema: tool_call_schema_json(),
            budget,
        }
    }

    pub fn system_prompt(&self, today: NaiveDate) -> String {
        format!(
            "{persona}\n\n\
             Today's date is {today} ({weekday}).\n\n\
             ## Protocol\n\
             Reply in exactly one of these forms:\n\
             1. To call a tool, output ONLY a JSON object: {{\"{TOOL_CALL_KEY}\": {{\"tool\": \"<name>\", \"arguments\": {{...}}}}}}\n\
             2. To ask the user a clarifying question, output ONLY: {{\"{CLARIFY_KEY}\": \"<question>\"}}\n\
             3. Otherwise answer in plain text (or {{\"{FINAL_ANSWER_KEY}\": \"<text>\"}}). Plain text must not start with '{{'.\n\
             Call one tool at a time. After a tool call you receive a message starting with \"{TOOL_RESPONSE_PREFIX}\"; \
             use it to answer the user or to decide the next call.\n\
             Convert relative dates (\"next Tuesday\") to YYYY-MM-DD and times (\"2:00 PM\") to 24-hour HH:MM.\n\
             If the meeting length or day is unknown, ask before searching. Only book after the user confirms a time.\n\n\
             ## Tool call schema\n{envelope}\n\n\
             ## Available tools\n{tools}",
            persona = self.persona,
            today = today.format("%Y-%m-%d"),
            weekday = today.format("%A"),
            envelope = self.envelope_schema,
            tools = self.tools_schema,
        )
    }

    /// 构建完整消息序列；日志本身不被修改
    pub fn build(&self, log: &ConversationLog, today: NaiveDate) -> Vec<Message> {
        let window = self
            .budget
            .select_suffix(log.turns(), |t| TokenEstimator::estimate(&t.content.render()));

        let mut messages = vec![Message::system(self.system_prompt(today))];
        for turn in window {
            render_turn(turn, &mut messages);
        }
        messages
    }
}

fn render_turn(turn: &ConversationTurn, out: &mut Vec<Message>) {
    match turn.role {
        Role::User => out.push(Message::user(turn.content.render())),
        Role::Assistant => out.push(Message::assistant(turn.content.render())),
        Role::System => out.push(Message::system(turn.content.render())),
        Role::Tool => {
            let call_id = turn.tool_call_id.as_deref().unwrap_or("-");
            let payload = turn.content.as_structured().cloned().unwrap_or(Value::Null);
            let envelope = json!({
                TOOL_CALL_KEY: {
                    "tool": payload["call"]["tool"],
                    "arguments": payload["call"]["arguments"],
                    "call_id": call_id,
                }
            });
            out.push(Message::assistant(envelope.to_string()));
            out.push(Message::user(format!(
                "{TOOL_RESPONSE_PREFIX} [{call_id}]: {}",
                payload["result"]
            )));
        }
    }
}
