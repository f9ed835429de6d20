//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCHEDULER__*` 覆盖（双下划线表示嵌套，如 `SCHEDULER__LLM__MODEL=gpt-4o`）。
//! 配置在启动时加载一次，之后以 `Arc<AppConfig>` 只读共享。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::core::{AgentError, RetryPolicy};
use crate::scheduling::parse_time_of_day;
use crate::tools::SlotDefaults;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub calendar: CalendarSection,
    pub conversation: ConversationSection,
    pub tools: ToolsSection,
    pub retry: RetrySection,
    pub slots: SlotsSection,
}

/// [app] 段：应用名、人设文件
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 人设 prompt 文件；未设置或读取失败时使用内置人设
    pub persona_path: Option<PathBuf>,
}

/// [llm] 段：OpenAI 兼容后端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// 存放 API Key 的环境变量名
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// [calendar] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    /// google / memory
    pub provider: String,
    pub calendar_id: String,
    pub base_url: Option<String>,
    /// 存放 OAuth access token 的环境变量名
    pub access_token_env: String,
    /// 日历本地时区相对 UTC 的偏移（分钟）
    pub utc_offset_minutes: i32,
    pub timeout_secs: u64,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            calendar_id: "primary".to_string(),
            base_url: None,
            access_token_env: "GOOGLE_CALENDAR_TOKEN".to_string(),
            utc_offset_minutes: 0,
            timeout_secs: 15,
        }
    }
}

/// [conversation] 段：单轮模型调用上限与历史窗口
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationSection {
    pub max_tool_iterations: usize,
    pub max_history_turns: usize,
    pub history_token_budget: usize,
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            max_tool_iterations: 5,
            max_history_turns: 40,
            history_token_budget: 6000,
        }
    }
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self { tool_timeout_secs: 30 }
    }
}

/// [retry] 段：外部协作方瞬时失败的重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 2000,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }
}

/// [slots] 段：空闲时段查询默认值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlotsSection {
    pub default_earliest: String,
    pub default_latest: String,
    pub exclude_weekends: bool,
    pub max_reported: usize,
}

impl Default for SlotsSection {
    fn default() -> Self {
        Self {
            default_earliest: "09:00".to_string(),
            default_latest: "17:00".to_string(),
            exclude_weekends: true,
            max_reported: 6,
        }
    }
}

impl SlotsSection {
    pub fn defaults(&self) -> Result<SlotDefaults, AgentError> {
        let parse = |key: &str, raw: &str| {
            parse_time_of_day(raw)
                .ok_or_else(|| AgentError::Config(format!("slots.{key}: '{raw}' is not a time of day")))
        };
        Ok(SlotDefaults {
            earliest: parse("default_earliest", &self.default_earliest)?,
            latest: parse("default_latest", &self.default_latest)?,
            exclude_weekends: self.exclude_weekends,
            max_reported: self.max_reported.max(1),
        })
    }
}

impl AppConfig {
    /// 启动期校验；失败时进程无法启动
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.conversation.max_tool_iterations == 0 {
            return Err(AgentError::Config(
                "conversation.max_tool_iterations must be at least 1".to_string(),
            ));
        }
        if !matches!(self.llm.provider.to_lowercase().as_str(), "openai" | "mock") {
            return Err(AgentError::Config(format!(
                "llm.provider: unknown provider '{}'",
                self.llm.provider
            )));
        }
        if !matches!(self.calendar.provider.to_lowercase().as_str(), "google" | "memory") {
            return Err(AgentError::Config(format!(
                "calendar.provider: unknown provider '{}'",
                self.calendar.provider
            )));
        }
        if self.calendar.utc_offset_minutes.abs() > 14 * 60 {
            return Err(AgentError::Config(format!(
                "calendar.utc_offset_minutes: {} is out of range",
                self.calendar.utc_offset_minutes
            )));
        }
        self.slots.defaults()?;
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 SCHEDULER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCHEDULER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCHEDULER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
