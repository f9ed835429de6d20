//! 模型输出协议：最终回复 / 澄清问题 / 工具调用
//!
//! 规则（不做文本嗅探）：去掉首尾空白与可选的 ```json 围栏后，
//! - 不以 `{` 开头 → 纯文本，视为 FinalAnswer；
//! - 以 `{` 开头 → 必须是只含一个保留键的 JSON 对象：
//!   `tool_call` → ToolCall，`clarify` → ClarifyingQuestion，`final_answer` → FinalAnswer；
//!   否则为 Protocol 错误（由编排器转为纠正提示让模型重试）。

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::AgentError;

pub const TOOL_CALL_KEY: &str = "tool_call";
pub const CLARIFY_KEY: &str = "clarify";
pub const FINAL_ANSWER_KEY: &str = "final_answer";

/// 模型发起的工具调用；call_id 由模型给出或在解析时生成（uuid v4）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    pub call_id: String,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            call_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// 协议信封：`{"tool_call": {"tool", "arguments", "call_id"}}`
    pub fn to_envelope(&self) -> Value {
        json!({
            TOOL_CALL_KEY: {
                "tool": self.tool,
                "arguments": self.arguments,
                "call_id": self.call_id,
            }
        })
    }
}

/// 模型一次输出的分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    FinalAnswer(String),
    ClarifyingQuestion(String),
    ToolCall(ToolCall),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawToolCall {
    tool: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
    #[serde(default)]
    call_id: Option<String>,
}

/// 解析模型原始输出。结构化输出格式错误时返回 AgentError::Protocol。
pub fn parse_model_output(output: &str) -> Result<ModelReply, AgentError> {
    let trimmed = output.trim();
    let body = strip_code_fence(trimmed);
    if !body.starts_with('{') {
        return Ok(ModelReply::FinalAnswer(trimmed.to_string()));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| AgentError::Protocol(format!("invalid JSON ({e})")))?;
    let object = value
        .as_object()
        .ok_or_else(|| AgentError::Protocol("expected a JSON object".to_string()))?;
    if object.len() != 1 {
        return Err(AgentError::Protocol(format!(
            "expected exactly one of \"{TOOL_CALL_KEY}\", \"{CLARIFY_KEY}\", \"{FINAL_ANSWER_KEY}\"; got keys [{}]",
            object.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    }
    let (key, inner) = object
        .iter()
        .next()
        .ok_or_else(|| AgentError::Protocol("empty object".to_string()))?;

    match key.as_str() {
        TOOL_CALL_KEY => {
            let raw: RawToolCall = serde_json::from_value(inner.clone())
                .map_err(|e| AgentError::Protocol(format!("malformed tool_call ({e})")))?;
            if raw.tool.trim().is_empty() {
                return Err(AgentError::Protocol("tool_call.tool is empty".to_string()));
            }
            let mut call = ToolCall::new(raw.tool, raw.arguments.unwrap_or_default());
            if let Some(id) = raw.call_id.filter(|id| !id.trim().is_empty()) {
                call.call_id = id;
            }
            Ok(ModelReply::ToolCall(call))
        }
        CLARIFY_KEY => text_field(key, inner).map(ModelReply::ClarifyingQuestion),
        FINAL_ANSWER_KEY => text_field(key, inner).map(ModelReply::FinalAnswer),
        other => Err(AgentError::Protocol(format!("unknown key \"{other}\""))),
    }
}

fn text_field(key: &str, value: &Value) -> Result<String, AgentError> {
    value
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| AgentError::Protocol(format!("\"{key}\" must be a string")))
}

/// 去掉 ```json ... ``` 或 ``` ... ``` 围栏；没有围栏时原样返回
fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
