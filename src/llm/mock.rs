//! Mock / Scripted LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! MockLlmClient：回显用户最后一条消息为最终回复，便于本地跑通对话流程。
//! ScriptedLlmClient：按顺序返回预设输出，并记录每次收到的消息列表，供编排器测试断言。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!(
            "(mock model) You said: \"{}\". Configure an API key to enable real scheduling.",
            last_user
        ))
    }
}

/// 脚本化客户端：依次弹出预设回复；队列耗尽后若设置了 repeat 则一直返回它
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    repeat: Option<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// 每次都返回同一输出（如始终发起工具调用）
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            repeat: Some(reply.into()),
            ..Self::default()
        }
    }

    /// 在队尾追加一次失败
    pub fn then_error(self, error: LlmError) -> Self {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(Err(error));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用收到的完整消息列表
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut r) = self.requests.lock() {
            r.push(messages.to_vec());
        }
        let next = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match (next, &self.repeat) {
            (Some(reply), _) => reply,
            (None, Some(repeat)) => Ok(repeat.clone()),
            (None, None) => Err(LlmError::ApiError("script exhausted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_last_user_message() {
        let out = MockLlmClient
            .complete(&[Message::system("sys"), Message::user("find me a slot")])
            .await
            .unwrap();
        assert!(out.contains("find me a slot"));
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order_then_fails() {
        let client = ScriptedLlmClient::new(["one", "two"]);
        assert_eq!(client.complete(&[]).await.unwrap(), "one");
        assert_eq!(client.complete(&[Message::user("x")]).await.unwrap(), "two");
        assert!(client.complete(&[]).await.is_err());
        assert_eq!(client.calls(), 3);
        assert_eq!(client.requests()[1], vec![Message::user("x")]);
    }

    #[tokio::test]
    async fn test_scripted_repeat_and_error() {
        let client = ScriptedLlmClient::repeating("again").then_error(LlmError::Network("down".into()));
        assert!(client.complete(&[]).await.is_err());
        assert_eq!(client.complete(&[]).await.unwrap(), "again");
        assert_eq!(client.complete(&[]).await.unwrap(), "again");
    }
}
