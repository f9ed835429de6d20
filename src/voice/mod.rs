//! 语音协作方边界
//!
//! Transcriber 产出一条用户话语（None 表示输入结束），Speaker 朗读回复。
//! 控制台实现把两者退化为逐行读 stdin、写 stdout，便于离线使用与测试。

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::core::AgentError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),
}

impl From<VoiceError> for AgentError {
    fn from(e: VoiceError) -> Self {
        match e {
            VoiceError::Transcription(msg) => AgentError::Transcription(msg),
            VoiceError::Synthesis(msg) => AgentError::Synthesis(msg),
        }
    }
}

#[async_trait]
pub trait Transcriber: Send {
    /// 下一条用户话语；输入结束时返回 None
    async fn transcribe(&mut self) -> Result<Option<String>, VoiceError>;
}

#[async_trait]
pub trait Speaker: Send {
    async fn speak(&mut self, text: &str) -> Result<(), VoiceError>;
}

/// 逐行读取文本输入，跳过空行
pub struct ConsoleTranscriber<R> {
    reader: R,
}

impl ConsoleTranscriber<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> ConsoleTranscriber<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Transcriber for ConsoleTranscriber<R> {
    async fn transcribe(&mut self) -> Result<Option<String>, VoiceError> {
        loop {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| VoiceError::Transcription(e.to_string()))?;
            if n == 0 {
                return Ok(None);
            }
            let text = line.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        }
    }
}

/// 把回复写成一行 `Assistant: ...`
pub struct ConsoleSpeaker<W> {
    writer: W,
}

impl ConsoleSpeaker<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleSpeaker<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Speaker for ConsoleSpeaker<W> {
    async fn speak(&mut self, text: &str) -> Result<(), VoiceError> {
        let line = format!("Assistant: {text}\n");
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| VoiceError::Synthesis(e.to_string()))
    }
}
