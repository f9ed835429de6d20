//! 工具调度器
//!
//! 持有 ToolRegistry 与统一超时：classify 分类模型输出，dispatch 校验并执行一次调用，
//! handler 错误与超时归一化为 ToolExecution；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tokio::time::timeout;

use crate::core::AgentError;
use crate::tools::protocol::{parse_model_output, ModelReply, ToolCall};
use crate::tools::ToolRegistry;

/// 一次工具调用的结果，与 ToolCall 一一对应
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub tool: String,
    pub outcome: Result<Value, AgentError>,
    /// 工具成功且声明 completes_action
    pub completed_action: bool,
    /// 归一化为 ToolExecution 之前的错误类别（如 collaborator_timeout_error、calendar_api_error）
    pub cause_kind: Option<&'static str>,
}

impl ToolResult {
    /// 写入 Tool 轮的结构化载荷：同时记录调用与结果
    pub fn to_payload(&self, call: &ToolCall) -> Value {
        let result = match &self.outcome {
            Ok(value) => json!({ "status": "ok", "data": value }),
            Err(e) => {
                let mut error = json!({ "status": "error", "kind": e.kind(), "message": e.to_string() });
                if let Some(cause_kind) = self.cause_kind {
                    error["cause_kind"] = json!(cause_kind);
                }
                error
            }
        };
        json!({
            "call": { "tool": call.tool, "arguments": call.arguments },
            "result": result,
        })
    }
}

/// dispatch_output 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// FinalAnswer 或 ClarifyingQuestion，不涉及工具
    Reply(ModelReply),
    Executed { call: ToolCall, result: ToolResult },
    ProtocolError(String),
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn classify(&self, output: &str) -> Result<ModelReply, AgentError> {
        parse_model_output(output)
    }

    /// 校验 → 超时内执行 → 归一化错误；总是返回 ToolResult
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let start = Instant::now();
        let mut cause_kind = None;
        let (outcome, completes_action, label) = match self.registry.validate(call) {
            Err(e) => (Err(e), false, "invalid"),
            Ok(tool) => match timeout(self.timeout, tool.execute(&call.arguments)).await {
                Ok(Ok(value)) => (Ok(value), tool.completes_action(), "ok"),
                Ok(Err(e)) => {
                    let original = e.kind();
                    let err = normalize_handler_error(&call.tool, e);
                    if err.kind() != original {
                        cause_kind = Some(original);
                    }
                    (Err(err), false, "error")
                }
                Err(_) => {
                    let cause = AgentError::CollaboratorTimeout {
                        collaborator: format!("tool '{}'", call.tool),
                        after_ms: self.timeout.as_millis() as u64,
                    };
                    cause_kind = Some(cause.kind());
                    (Err(normalize_handler_error(&call.tool, cause)), false, "timeout")
                }
            },
        };

        let audit = json!({
            "event": "tool_audit",
            "tool": call.tool,
            "call_id": call.call_id,
            "ok": outcome.is_ok(),
            "outcome": label,
            "cause_kind": cause_kind,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&Value::Object(call.arguments.clone())),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        ToolResult {
            call_id: call.call_id.clone(),
            tool: call.tool.clone(),
            outcome,
            completed_action: completes_action,
            cause_kind,
        }
    }

    pub async fn dispatch_output(&self, output: &str) -> DispatchOutcome {
        match self.classify(output) {
            Err(e) => DispatchOutcome::ProtocolError(e.to_string()),
            Ok(ModelReply::ToolCall(call)) => {
                let result = self.dispatch(&call).await;
                DispatchOutcome::Executed { call, result }
            }
            Ok(reply) => DispatchOutcome::Reply(reply),
        }
    }
}

/// handler 主动返回的参数错误保持原样，其余一律视为执行失败
fn normalize_handler_error(tool: &str, err: AgentError) -> AgentError {
    match err {
        AgentError::SchemaValidation { .. } | AgentError::ToolExecution { .. } => err,
        other => AgentError::ToolExecution {
            tool: tool.to_string(),
            cause: other.to_string(),
        },
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
