//! 记忆层：只追加的会话日志与历史窗口预算

pub mod conversation;
pub mod token_budget;

pub use conversation::{ConversationLog, ConversationTurn, Message, Role, TurnContent};
pub use token_budget::{HistoryBudget, TokenEstimator};
