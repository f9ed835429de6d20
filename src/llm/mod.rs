//! LLM 层：客户端抽象与实现（OpenAI 兼容 / Mock / Scripted），以及超时重试包装

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::OpenAiClient;
pub use traits::{LlmClient, LlmError, RetryConfig, RetryingLlmClient};
