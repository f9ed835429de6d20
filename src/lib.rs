//! Smart Scheduler - 对话式会议排期助手
//!
//! 模块划分：
//! - **agent**: 组件装配（LLM / 日历 / 工具 / 编排器）
//! - **calendar**: 日历协作方边界（Google Calendar REST / 内存实现）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排器状态机、错误与恢复、重试策略
//! - **dialogue**: Prompt 构建与回复模板
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock / Scripted）
//! - **memory**: 只追加的会话日志与历史窗口预算
//! - **observability**: tracing 日志初始化
//! - **scheduling**: 空闲时段计算与日期解析
//! - **tools**: 工具协议、参数校验、调度器与排期工具
//! - **voice**: 语音协作方边界（控制台实现）

pub mod agent;
pub mod calendar;
pub mod config;
pub mod core;
pub mod dialogue;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod scheduling;
pub mod tools;
pub mod voice;

pub use crate::core::{AgentError, AgentOutcome, ConversationOrchestrator};
