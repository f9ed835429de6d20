//! 会话状态机
//!
//! 一次用户输入的处理路径：
//! Idle → AwaitingModelResponse → {AwaitingToolResult → AwaitingModelResponse}* → Completed，
//! 模型提出澄清问题时停在 AwaitingUserInput；任意状态遇到不可恢复错误进入 Failed。
//! 模型输出无法解析时注入纠正提示并再次调用模型，即 AwaitingModelResponse → AwaitingModelResponse。

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConversationState {
    Idle,
    AwaitingModelResponse,
    AwaitingToolResult,
    AwaitingUserInput,
    Completed,
    Failed,
}

impl ConversationState {
    /// 可以开始处理新的用户输入（Failed 不结束会话）
    pub fn accepts_user_turn(&self) -> bool {
        matches!(
            self,
            ConversationState::Idle
                | ConversationState::AwaitingUserInput
                | ConversationState::Completed
                | ConversationState::Failed
        )
    }

    /// 状态转移是否合法
    pub fn can_transition_to(&self, next: ConversationState) -> bool {
        use ConversationState::*;
        if next == Failed {
            return true;
        }
        match self {
            Idle => next == AwaitingModelResponse,
            AwaitingModelResponse => matches!(
                next,
                AwaitingModelResponse | AwaitingToolResult | AwaitingUserInput | Completed
            ),
            AwaitingToolResult => next == AwaitingModelResponse,
            AwaitingUserInput | Completed | Failed => next == Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConversationState::*;

    #[test]
    fn test_new_turn_states() {
        assert!(Idle.accepts_user_turn());
        assert!(Failed.accepts_user_turn());
        assert!(AwaitingUserInput.accepts_user_turn());
        assert!(!AwaitingToolResult.accepts_user_turn());
        assert!(!AwaitingModelResponse.accepts_user_turn());
    }

    #[test]
    fn test_transitions() {
        assert!(Idle.can_transition_to(AwaitingModelResponse));
        assert!(AwaitingModelResponse.can_transition_to(AwaitingToolResult));
        assert!(AwaitingToolResult.can_transition_to(AwaitingModelResponse));
        assert!(AwaitingToolResult.can_transition_to(Failed));
        assert!(AwaitingModelResponse.can_transition_to(AwaitingModelResponse));
        assert!(!AwaitingToolResult.can_transition_to(AwaitingToolResult));
        assert!(!Idle.can_transition_to(Completed));
        assert!(!AwaitingToolResult.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Idle));
    }
}
