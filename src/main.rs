//! RepoPilot - 对话式 GitHub 仓库助手
//!
//! 入口：初始化日志、按配置组装 Assistant，并在标准输入输出上运行 REPL。

use anyhow::Context;
use repopilot::core::create_assistant;
use repopilot::memory::SessionId;
use repopilot::ui::run_repl;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    repopilot::observability::init();

    let config_path = std::env::var("REPOPILOT_CONFIG").ok().map(Into::into);
    let (assistant, cfg) = create_assistant(config_path)
        .await
        .context("Failed to create assistant")?;
    let session = SessionId::new(cfg.app.session_id.clone());
    tracing::info!(session = %session, actions = ?assistant.action_names(), "assistant ready");

    let stdin = BufReader::new(tokio::io::stdin());
    run_repl(&assistant, &session, stdin, tokio::io::stdout())
        .await
        .context("REPL failed")?;

    let (prompt, completion, total) = assistant.token_usage();
    tracing::info!(prompt, completion, total, "session token usage");
    assistant.shutdown();
    Ok(())
}
