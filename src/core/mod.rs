//! 核心编排层：错误与恢复、会话状态机、重试策略、主控循环

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod retry;
pub mod state;

pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{AgentOutcome, ConversationOrchestrator};
pub use recovery::RecoveryEngine;
pub use retry::RetryPolicy;
pub use state::ConversationState;
