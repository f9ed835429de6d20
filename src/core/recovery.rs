//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供编排器决定是注入纠正提示、向用户致歉、结束本轮还是终止。

use crate::core::{AgentError, RecoveryAction};
use crate::tools::protocol::{CLARIFY_KEY, FINAL_ANSWER_KEY, TOOL_CALL_KEY};

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::Protocol(reason) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous reply could not be parsed: {reason}. \
                 To call a tool, reply with exactly one JSON object and nothing else, shaped like \
                 {{\"{TOOL_CALL_KEY}\": {{\"tool\": \"<name>\", \"arguments\": {{...}}}}}}. \
                 To ask the user something use {{\"{CLARIFY_KEY}\": \"<question>\"}}; \
                 to answer use plain text or {{\"{FINAL_ANSWER_KEY}\": \"<text>\"}}."
            )),
            AgentError::SchemaValidation { tool, field, reason } => RecoveryAction::RetryWithPrompt(format!(
                "The call to '{tool}' was rejected: parameter '{field}' {reason}. \
                 Fix the arguments and call the tool again, or ask the user for the missing detail."
            )),
            AgentError::ToolExecution { .. } => RecoveryAction::SurfaceToUser(
                "Sorry, I couldn't reach your calendar just now. Please try again in a moment.".to_string(),
            ),
            AgentError::CalendarApi(_) => RecoveryAction::SurfaceToUser(
                "Sorry, the calendar service returned an error. Please try again later.".to_string(),
            ),
            AgentError::SlotNotFound(_) => RecoveryAction::SurfaceToUser(
                "I couldn't find a free slot in that range. Would another date work?".to_string(),
            ),
            AgentError::ModelInvocation(_)
            | AgentError::CollaboratorTimeout { .. }
            | AgentError::Transcription(_)
            | AgentError::Synthesis(_) => RecoveryAction::FailTurn,
            AgentError::Config(_) => RecoveryAction::Abort,
        }
    }
}
