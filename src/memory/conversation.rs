//! 会话日志：只追加的有序 ConversationTurn 序列
//!
//! 顺序是唯一的上下文来源；轮次一旦追加不可修改，也没有删除接口（Prompt 侧的窗口裁剪只影响视图）。
//! `Message` 是发给 LLM 的扁平消息，由 PromptBuilder 从日志渲染得到。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与 LLM API 一致；Tool 仅出现在会话日志中）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    System,
}

/// 发给 LLM 的单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 轮次内容：纯文本或结构化负载（工具结果）
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Structured(Value),
}

impl TurnContent {
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            TurnContent::Structured(v) => Some(v),
            TurnContent::Text(_) => None,
        }
    }

    /// 渲染为文本（结构化内容序列化为紧凑 JSON）
    pub fn render(&self) -> String {
        match self {
            TurnContent::Text(t) => t.clone(),
            TurnContent::Structured(v) => v.to_string(),
        }
    }
}

/// 会话中的一轮（用户输入、模型回复、工具结果或纠正提示）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
            tool_call_id: None,
        }
    }

    /// 协议纠正提示（模型输出无法解析时注入）
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: TurnContent::Text(text.into()),
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            role: Role::Tool,
            content: TurnContent::Structured(payload),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// 只追加的会话日志（单会话内有效，不跨会话持久化）
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
