//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt / SurfaceToUser / FailTurn / Abort。

use thiserror::Error;

/// 排期助手运行过程中可能出现的错误（语音、模型、协议、参数校验、工具执行、超时）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// 模型调用本身失败（网络、API 错误、超时重试耗尽）
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    /// 模型输出声明为结构化（以 `{` 开头）但无法解析为合法信封
    #[error("Malformed tool-call structure: {0}")]
    Protocol(String),

    /// 结构合法但参数不符合工具 schema；此时 handler 不会被调用
    #[error("Invalid arguments for tool '{tool}' (field '{field}'): {reason}")]
    SchemaValidation {
        tool: String,
        field: String,
        reason: String,
    },

    /// handler 已运行但底层动作失败（如日历 API 报错）
    #[error("Tool '{tool}' failed: {cause}")]
    ToolExecution { tool: String, cause: String },

    #[error("{collaborator} timed out after {after_ms} ms")]
    CollaboratorTimeout { collaborator: String, after_ms: u64 },

    #[error("Calendar API error: {0}")]
    CalendarApi(String),

    /// 合法但无结果：请求范围内没有足够长的空闲时段（非故障）
    #[error("No free slot found: {0}")]
    SlotNotFound(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 供 ToolResult 序列化使用的错误类别名
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Transcription(_) => "transcription_error",
            AgentError::Synthesis(_) => "synthesis_error",
            AgentError::ModelInvocation(_) => "model_invocation_error",
            AgentError::Protocol(_) => "protocol_error",
            AgentError::SchemaValidation { .. } => "schema_validation_error",
            AgentError::ToolExecution { .. } => "tool_execution_error",
            AgentError::CollaboratorTimeout { .. } => "collaborator_timeout_error",
            AgentError::CalendarApi(_) => "calendar_api_error",
            AgentError::SlotNotFound(_) => "slot_not_found",
            AgentError::Config(_) => "config_error",
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 将纠正提示注入对话，让模型重试（协议错误、参数错误）
    RetryWithPrompt(String),
    /// 以致歉模板告知用户，会话继续
    SurfaceToUser(String),
    /// 本轮失败（进入 Failed），下一条用户输入回到 Idle
    FailTurn,
    /// 终止进程（仅启动期配置错误）
    Abort,
}
