//! 对话层：提示构建与回复模板

pub mod composer;
pub mod prompt;

pub use composer::ResponseComposer;
pub use prompt::{PromptBuilder, DEFAULT_PERSONA, TOOL_RESPONSE_PREFIX};
