//! 日历协作方边界
//!
//! CalendarClient 抽象 free/busy 查询、单事件创建、即将到来的事件列表；
//! 实现：GoogleCalendarClient（REST + Bearer Token）、InMemoryCalendar（测试与离线演示）。

pub mod google;
pub mod in_memory;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;

use crate::core::retry::Transient;
use crate::core::AgentError;
use crate::scheduling::BusyInterval;

pub use google::GoogleCalendarClient;
pub use in_memory::InMemoryCalendar;

/// 日历 API 错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalendarError {
    #[error("Calendar request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl Transient for CalendarError {
    fn is_transient(&self) -> bool {
        match self {
            CalendarError::Timeout { .. } | CalendarError::Network(_) => true,
            CalendarError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<CalendarError> for AgentError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::Timeout { after_ms } => AgentError::CollaboratorTimeout {
                collaborator: "calendar".to_string(),
                after_ms,
            },
            other => AgentError::CalendarApi(other.to_string()),
        }
    }
}

/// 待创建的事件
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// 创建成功的事件：ID 与可选的网页链接
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedEvent {
    pub id: String,
    pub link: Option<String>,
}

/// 日历中已存在的事件（仅用于展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// 查询 [start, end) 内的忙碌区间（结果不保证有序、不保证不重叠）
    async fn query_free_busy(
        &self,
        calendar_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<BusyInterval>, CalendarError>;

    /// 创建单个事件（非幂等，实现不得自动重试）
    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<CreatedEvent, CalendarError>;

    /// 从 from 起按开始时间列出最多 max_results 个事件
    async fn list_upcoming(
        &self,
        calendar_id: &str,
        from: NaiveDateTime,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    /// 启动时的连通性检查：日历可访问且凭据有效
    async fn check_connection(&self, calendar_id: &str) -> Result<(), CalendarError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(CalendarError::Timeout { after_ms: 10 }.is_transient());
        assert!(CalendarError::Http { status: 503, body: String::new() }.is_transient());
        assert!(CalendarError::Http { status: 429, body: String::new() }.is_transient());
        assert!(!CalendarError::Http { status: 401, body: String::new() }.is_transient());
        assert!(!CalendarError::Decode("x".into()).is_transient());
    }

    #[test]
    fn test_into_agent_error() {
        let timeout: AgentError = CalendarError::Timeout { after_ms: 5 }.into();
        assert_eq!(
            timeout,
            AgentError::CollaboratorTimeout {
                collaborator: "calendar".into(),
                after_ms: 5
            }
        );
        let http: AgentError = CalendarError::Http { status: 403, body: "denied".into() }.into();
        assert!(matches!(http, AgentError::CalendarApi(msg) if msg.contains("403")));
    }
}
