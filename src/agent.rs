//! 组件装配
//!
//! 从 AppConfig 构建 LLM（含超时重试包装）、日历客户端、工具注册表、PromptBuilder 与 ResponseComposer，
//! 最终得到可直接驱动的 ConversationOrchestrator。缺少 API Key / Token 时回退到 Mock / 内存实现。
//! run_session 驱动语音协作方与编排器之间的会话循环。

use std::sync::Arc;
use std::time::Duration;

use crate::calendar::{CalendarClient, GoogleCalendarClient, InMemoryCalendar};
use crate::config::AppConfig;
use crate::core::{AgentError, AgentOutcome, ConversationOrchestrator};
use crate::dialogue::{PromptBuilder, ResponseComposer, DEFAULT_PERSONA};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, RetryConfig, RetryingLlmClient};
use crate::memory::HistoryBudget;
use crate::tools::{CreateEventTool, FindFreeSlotsTool, ToolDispatcher, ToolRegistry, UpcomingEventsTool};
use crate::voice::{Speaker, Transcriber};

/// 连续转写失败达到该次数即结束会话
pub const MAX_TRANSCRIPTION_FAILURES: u32 = 3;

const EXIT_WORDS: &[&str] = &["exit", "quit", "goodbye", "stop"];

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// 根据配置与环境变量选择 LLM 后端（OpenAI 兼容 / Mock），并包上超时重试
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let inner: Arc<dyn LlmClient> = match cfg.llm.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockLlmClient)
        }
        _ => match env_secret(&cfg.llm.api_key_env) {
            Some(key) => {
                tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
                Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, &key))
            }
            None => {
                tracing::warn!("{} is not set, using Mock LLM", cfg.llm.api_key_env);
                Arc::new(MockLlmClient)
            }
        },
    };
    Arc::new(RetryingLlmClient::new(
        inner,
        RetryConfig {
            request_timeout: Duration::from_secs(cfg.llm.timeout_secs),
            policy: cfg.retry.policy(),
        },
    ))
}

/// 根据配置选择日历实现；Google 缺少 Token 时回退到内存日历
pub fn create_calendar_from_config(cfg: &AppConfig) -> Result<Arc<dyn CalendarClient>, AgentError> {
    if cfg.calendar.provider.eq_ignore_ascii_case("memory") {
        tracing::info!("Using in-memory calendar");
        return Ok(Arc::new(InMemoryCalendar::new()));
    }
    let Some(token) = env_secret(&cfg.calendar.access_token_env) else {
        tracing::warn!("{} is not set, using in-memory calendar", cfg.calendar.access_token_env);
        return Ok(Arc::new(InMemoryCalendar::new()));
    };
    let client = GoogleCalendarClient::new(
        cfg.calendar.base_url.as_deref(),
        token,
        cfg.calendar.utc_offset_minutes,
        Duration::from_secs(cfg.calendar.timeout_secs),
        cfg.retry.policy(),
    )
    .map_err(|e| AgentError::Config(format!("calendar client: {e}")))?;
    tracing::info!("Using Google Calendar ({})", cfg.calendar.calendar_id);
    Ok(Arc::new(client))
}

/// 注册排期工具
pub fn build_registry(cfg: &AppConfig, calendar: Arc<dyn CalendarClient>) -> Result<ToolRegistry, AgentError> {
    let calendar_id = cfg.calendar.calendar_id.as_str();
    let offset = cfg.calendar.utc_offset_minutes;
    let mut tools = ToolRegistry::new();
    tools.register(
        FindFreeSlotsTool::new(calendar.clone(), calendar_id, cfg.slots.defaults()?).with_utc_offset(offset),
    );
    tools.register(CreateEventTool::new(calendar.clone(), calendar_id).with_utc_offset(offset));
    tools.register(UpcomingEventsTool::new(calendar, calendar_id, offset));
    Ok(tools)
}

/// 人设：配置文件 > config/persona.txt > 内置
pub fn load_persona(cfg: &AppConfig) -> String {
    let configured = cfg.app.persona_path.iter().cloned();
    let fallbacks = ["config/persona.txt", "../config/persona.txt"].into_iter().map(Into::into);
    configured
        .chain(fallbacks)
        .find_map(|p: std::path::PathBuf| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_PERSONA.to_string())
}

/// 用给定的 LLM 与日历装配编排器（测试可注入替身）
pub fn assemble(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    calendar: Arc<dyn CalendarClient>,
) -> Result<ConversationOrchestrator, AgentError> {
    cfg.validate()?;
    let registry = Arc::new(build_registry(cfg, calendar)?);
    let prompt = PromptBuilder::new(
        load_persona(cfg),
        &registry,
        HistoryBudget::new(
            cfg.conversation.max_history_turns,
            cfg.conversation.history_token_budget,
        ),
    );
    let dispatcher = ToolDispatcher::new(registry, Duration::from_secs(cfg.tools.tool_timeout_secs));
    let composer = ResponseComposer::new(cfg.slots.max_reported);
    Ok(ConversationOrchestrator::new(llm, dispatcher, prompt, composer)
        .with_max_iterations(cfg.conversation.max_tool_iterations)
        .with_utc_offset(cfg.calendar.utc_offset_minutes))
}

/// 从配置装配编排器；日历不可访问时拒绝启动
pub async fn create_orchestrator(cfg: &AppConfig) -> Result<ConversationOrchestrator, AgentError> {
    cfg.validate()?;
    let llm = create_llm_from_config(cfg);
    let calendar = create_calendar_from_config(cfg)?;
    calendar
        .check_connection(&cfg.calendar.calendar_id)
        .await
        .map_err(|e| AgentError::Config(format!("calendar connection failed: {e}")))?;
    assemble(cfg, llm, calendar)
}

/// 单词退出指令（忽略大小写与结尾标点）
pub fn is_exit(text: &str) -> bool {
    let word = text.trim().trim_end_matches(['.', '!']).to_lowercase();
    EXIT_WORDS.contains(&word.as_str())
}

async fn say(speaker: &mut dyn Speaker, text: &str) {
    if let Err(e) = speaker.speak(text).await {
        tracing::warn!(error = %e, "speech synthesis failed");
    }
}

/// 会话循环：问候，逐句转写并处理，朗读结果，最后告别。
///
/// 输入结束或听到退出词时正常结束；连续 MAX_TRANSCRIPTION_FAILURES 次转写失败时
/// 朗读致歉并返回 Transcription 错误。
pub async fn run_session(
    orchestrator: &mut ConversationOrchestrator,
    transcriber: &mut dyn Transcriber,
    speaker: &mut dyn Speaker,
) -> Result<(), AgentError> {
    say(speaker, &orchestrator.composer().greeting()).await;

    let mut failures = 0;
    let result = loop {
        let utterance = match transcriber.transcribe().await {
            Ok(Some(text)) => text,
            Ok(None) => break Ok(()),
            Err(e) => {
                let err = AgentError::from(e);
                failures += 1;
                tracing::warn!(error = %err, failures, "transcription failed");
                if failures >= MAX_TRANSCRIPTION_FAILURES {
                    say(speaker, &orchestrator.composer().apology(&err)).await;
                    break Err(err);
                }
                continue;
            }
        };
        failures = 0;
        if is_exit(&utterance) {
            break Ok(());
        }

        let outcome = orchestrator.process_turn(&utterance).await;
        if let AgentOutcome::Error(reason) = &outcome {
            tracing::warn!(reason = %reason, "turn ended with error");
        }
        say(speaker, &orchestrator.composer().render(&outcome)).await;
    };

    if result.is_ok() {
        say(speaker, &orchestrator.composer().farewell()).await;
    }
    let (prompt_tokens, completion_tokens, total_tokens) = orchestrator.token_usage();
    tracing::info!(prompt_tokens, completion_tokens, total_tokens, "session ended");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;
    use crate::voice::VoiceError;
    use async_trait::async_trait;

    struct BrokenInput {
        calls: u32,
    }

    #[async_trait]
    impl Transcriber for BrokenInput {
        async fn transcribe(&mut self) -> Result<Option<String>, VoiceError> {
            self.calls += 1;
            Err(VoiceError::Transcription("input/output error".into()))
        }
    }

    /// 依次产出预设话语或错误，耗尽后表示输入结束
    struct ScriptedInput(Vec<Result<String, VoiceError>>);

    #[async_trait]
    impl Transcriber for ScriptedInput {
        async fn transcribe(&mut self) -> Result<Option<String>, VoiceError> {
            if self.0.is_empty() {
                return Ok(None);
            }
            self.0.remove(0).map(Some)
        }
    }

    #[derive(Default)]
    struct Transcript(Vec<String>);

    #[async_trait]
    impl Speaker for Transcript {
        async fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
            self.0.push(text.to_string());
            Ok(())
        }
    }

    fn scripted_orchestrator(replies: &[&str]) -> ConversationOrchestrator {
        assemble(
            &AppConfig::default(),
            Arc::new(ScriptedLlmClient::new(replies.iter().copied())),
            Arc::new(InMemoryCalendar::new()),
        )
        .unwrap()
    }

    fn input_error() -> Result<String, VoiceError> {
        Err(VoiceError::Transcription("glitch".into()))
    }

    #[test]
    fn test_exit_words() {
        assert!(is_exit("quit"));
        assert!(is_exit("  Goodbye! "));
        assert!(is_exit("STOP."));
        assert!(!is_exit("stop the meeting"));
    }

    #[tokio::test]
    async fn test_session_stops_after_repeated_transcription_failures() {
        let mut orch = scripted_orchestrator(&[]);
        let mut input = BrokenInput { calls: 0 };
        let mut out = Transcript::default();

        let err = run_session(&mut orch, &mut input, &mut out).await.unwrap_err();
        assert!(matches!(err, AgentError::Transcription(_)));
        assert_eq!(input.calls, MAX_TRANSCRIPTION_FAILURES);
        // 问候 + 致歉，没有告别
        assert_eq!(out.0.len(), 2);
        assert_eq!(out.0[1], orch.composer().apology(&err));
    }

    #[tokio::test]
    async fn test_transcription_failure_count_resets_after_success() {
        let mut orch = scripted_orchestrator(&["First.", "Second."]);
        let mut input = ScriptedInput(vec![
            input_error(),
            input_error(),
            Ok("hello".into()),
            input_error(),
            input_error(),
            Ok("again".into()),
            Ok("quit".into()),
        ]);
        let mut out = Transcript::default();

        run_session(&mut orch, &mut input, &mut out).await.unwrap();
        assert_eq!(out.0[1..3], ["First.".to_string(), "Second.".to_string()]);
        assert_eq!(out.0.last().map(String::as_str), Some("Goodbye! Have a great day!"));
    }

    #[tokio::test]
    async fn test_session_ends_on_end_of_input() {
        let mut orch = scripted_orchestrator(&["Sure."]);
        let mut input = ScriptedInput(vec![Ok("hi".into())]);
        let mut out = Transcript::default();

        run_session(&mut orch, &mut input, &mut out).await.unwrap();
        assert_eq!(out.0.len(), 3);
        assert_eq!(out.0[1], "Sure.");
    }

    #[tokio::test]
    async fn test_unreachable_calendar_refuses_to_start() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.calendar.provider = "google".to_string();
        cfg.calendar.access_token_env = "CALENDAR_TOKEN_FOR_UNREACHABLE_TEST".to_string();
        cfg.calendar.base_url = Some("http://127.0.0.1:9".to_string());
        cfg.calendar.timeout_secs = 1;
        cfg.retry.max_attempts = 1;
        std::env::set_var("CALENDAR_TOKEN_FOR_UNREACHABLE_TEST", "token");

        let result = create_orchestrator(&cfg).await;
        std::env::remove_var("CALENDAR_TOKEN_FOR_UNREACHABLE_TEST");
        assert!(matches!(result, Err(AgentError::Config(ref msg)) if msg.contains("calendar connection failed")));
    }

    #[tokio::test]
    async fn test_mock_provider_end_to_end() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg.calendar.provider = "memory".to_string();
        let mut orch = create_orchestrator(&cfg).await.unwrap();
        match orch.process_turn("find me a slot").await {
            AgentOutcome::SpokenReply(text) => assert!(text.contains("find me a slot")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_registry_has_scheduling_tools() {
        let cfg = AppConfig::default();
        let reg = build_registry(&cfg, Arc::new(InMemoryCalendar::new())).unwrap();
        assert_eq!(
            reg.tool_names(),
            vec!["create_event", "find_free_slots", "list_upcoming_events"]
        );
    }

    #[test]
    fn test_invalid_config_aborts_assembly() {
        let mut cfg = AppConfig::default();
        cfg.conversation.max_tool_iterations = 0;
        let result = assemble(&cfg, Arc::new(MockLlmClient), Arc::new(InMemoryCalendar::new()));
        assert!(matches!(result, Err(AgentError::Config(_))));
    }
}
