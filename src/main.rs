//! Smart Scheduler - 对话式会议排期助手
//!
//! 入口：初始化日志、加载配置、装配编排器，然后交给 run_session 逐句读取用户输入并朗读回复。

use std::path::PathBuf;

use anyhow::Context;
use smart_scheduler::{
    agent::{create_orchestrator, run_session},
    config::load_config,
    observability,
    voice::{ConsoleSpeaker, ConsoleTranscriber},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let mut orchestrator = create_orchestrator(&cfg)
        .await
        .context("Failed to create scheduler")?;

    let mut transcriber = ConsoleTranscriber::stdin();
    let mut speaker = ConsoleSpeaker::stdout();
    run_session(&mut orchestrator, &mut transcriber, &mut speaker)
        .await
        .context("Session ended")?;
    Ok(())
}
