//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / Scripted）实现 LlmClient::complete（非流式，返回纯文本）。
//! RetryingLlmClient 为任意后端加上单次超时与瞬时失败重试。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::timeout;

use crate::core::retry::{RetryPolicy, Transient};
use crate::core::AgentError;
use crate::memory::Message;

/// 模型调用错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Model request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl Transient for LlmError {
    fn is_transient(&self) -> bool {
        !matches!(self, LlmError::ApiError(_))
    }
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout { after_ms } => AgentError::CollaboratorTimeout {
                collaborator: "model".to_string(),
                after_ms,
            },
            other => AgentError::ModelInvocation(other.to_string()),
        }
    }
}

/// LLM 客户端 trait：输入完整消息列表（含 system），返回模型原始文本输出
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 超时与重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub request_timeout: Duration,
    pub policy: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            policy: RetryPolicy::default(),
        }
    }
}

/// 包装任意 LlmClient：每次调用加超时，瞬时失败（超时、网络）按策略重试
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    config: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let limit = self.config.request_timeout;
        let inner = &self.inner;
        self.config
            .policy
            .run("model", || async move {
                match timeout(limit, inner.complete(messages)).await {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout {
                        after_ms: limit.as_millis() as u64,
                    }),
                }
            })
            .await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}
