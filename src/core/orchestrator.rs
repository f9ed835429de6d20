//! 会话编排器：主控循环
//!
//! 每条用户输入驱动一次有界循环：构建 prompt → 调用模型 → 分类输出 →
//! 工具调用则 dispatch 并追加 Tool 轮后继续，协议错误则追加纠正提示后继续，
//! 最终回复或澄清问题则追加 Assistant 轮并结束本轮。每次迭代恰好追加一轮日志。

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::core::recovery::RecoveryEngine;
use crate::core::state::ConversationState;
use crate::core::{AgentError, RecoveryAction};
use crate::dialogue::{PromptBuilder, ResponseComposer};
use crate::llm::LlmClient;
use crate::memory::{ConversationLog, ConversationTurn};
use crate::tools::{ModelReply, ToolDispatcher, ToolResult};

pub const DEFAULT_MAX_TOOL_ITERATIONS: usize = 5;

/// 一次 process_turn 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    SpokenReply(String),
    ClarificationNeeded(String),
    ActionCompleted(String),
    Error(String),
}

pub struct ConversationOrchestrator {
    llm: Arc<dyn LlmClient>,
    dispatcher: ToolDispatcher,
    prompt: PromptBuilder,
    composer: ResponseComposer,
    recovery: RecoveryEngine,
    log: ConversationLog,
    state: ConversationState,
    state_trace: Vec<ConversationState>,
    max_iterations: usize,
    utc_offset_minutes: i32,
    today: Option<NaiveDate>,
}

impl ConversationOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        dispatcher: ToolDispatcher,
        prompt: PromptBuilder,
        composer: ResponseComposer,
    ) -> Self {
        Self {
            llm,
            dispatcher,
            prompt,
            composer,
            recovery: RecoveryEngine::new(),
            log: ConversationLog::new(),
            state: ConversationState::Idle,
            state_trace: Vec::new(),
            max_iterations: DEFAULT_MAX_TOOL_ITERATIONS,
            utc_offset_minutes: 0,
            today: None,
        }
    }

    /// 单轮最多调用模型的次数（至少 1）
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    /// 固定「今天」（测试用）
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    /// 最近一次 process_turn 经过的状态序列
    pub fn state_trace(&self) -> &[ConversationState] {
        &self.state_trace
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn composer(&self) -> &ResponseComposer {
        &self.composer
    }

    /// 模型累计 token 用量 (prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| {
            (Utc::now().naive_utc() + Duration::minutes(i64::from(self.utc_offset_minutes))).date()
        })
    }

    fn transition(&mut self, next: ConversationState) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = ?self.state, to = ?next, "unexpected state transition");
        }
        tracing::debug!(from = ?self.state, to = ?next, "state");
        self.state = next;
        self.state_trace.push(next);
    }

    fn fail(&mut self, reason: String) -> AgentOutcome {
        tracing::warn!(reason = %reason, "turn failed");
        self.transition(ConversationState::Failed);
        AgentOutcome::Error(reason)
    }

    /// 处理一条用户输入，返回本轮结果。失败的轮次不结束会话。
    pub async fn process_turn(&mut self, user_text: &str) -> AgentOutcome {
        self.state_trace.clear();
        if self.state == ConversationState::Idle {
            self.state_trace.push(ConversationState::Idle);
        } else {
            if !self.state.accepts_user_turn() {
                tracing::warn!(state = ?self.state, "new user turn while a turn is in flight");
            }
            self.transition(ConversationState::Idle);
        }

        self.log.append(ConversationTurn::user(user_text));
        let mut last_result: Option<ToolResult> = None;
        let mut action_summary: Option<String> = None;

        for iteration in 1..=self.max_iterations {
            self.transition(ConversationState::AwaitingModelResponse);
            let messages = self.prompt.build(&self.log, self.today());
            tracing::info!(iteration, messages = messages.len(), "model call");

            let output = match self.llm.complete(&messages).await {
                Ok(output) => output,
                Err(e) => {
                    let err = AgentError::from(e);
                    return self.fail(err.to_string());
                }
            };

            let reply = match self.dispatcher.classify(&output) {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "protocol error");
                    match self.recovery.handle(&e) {
                        RecoveryAction::RetryWithPrompt(text) => {
                            self.log.append(ConversationTurn::system(text));
                            continue;
                        }
                        _ => return self.fail(e.to_string()),
                    }
                }
            };

            match reply {
                ModelReply::ToolCall(call) => {
                    self.transition(ConversationState::AwaitingToolResult);
                    let result = self.dispatcher.dispatch(&call).await;
                    self.log
                        .append(ConversationTurn::tool(call.call_id.clone(), result.to_payload(&call)));

                    if let Err(e) = &result.outcome {
                        match self.recovery.handle(e) {
                            // 错误已在 Tool 轮中，模型下一次调用时自行修正
                            RecoveryAction::RetryWithPrompt(_) => {}
                            RecoveryAction::SurfaceToUser(_) => {
                                let apology = self.composer.apology(e);
                                self.transition(ConversationState::Completed);
                                return AgentOutcome::SpokenReply(apology);
                            }
                            RecoveryAction::FailTurn | RecoveryAction::Abort => {
                                return self.fail(e.to_string());
                            }
                        }
                    } else if result.completed_action {
                        action_summary = Some(self.composer.summarize(&result));
                    }
                    last_result = Some(result);
                }
                ModelReply::ClarifyingQuestion(question) => {
                    self.log.append(ConversationTurn::assistant(question.clone()));
                    self.transition(ConversationState::AwaitingUserInput);
                    return AgentOutcome::ClarificationNeeded(question);
                }
                ModelReply::FinalAnswer(text) => {
                    let text = if text.is_empty() {
                        match &last_result {
                            Some(result) => self.composer.summarize(result),
                            None => "Sorry, I don't have an answer for that.".to_string(),
                        }
                    } else {
                        text
                    };
                    self.log.append(ConversationTurn::assistant(text.clone()));
                    self.transition(ConversationState::Completed);
                    return match action_summary {
                        Some(summary) => AgentOutcome::ActionCompleted(summary),
                        None => AgentOutcome::SpokenReply(text),
                    };
                }
            }
        }

        self.fail(format!(
            "could not complete request within {} model calls",
            self.max_iterations
        ))
    }
}
