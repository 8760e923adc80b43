//! 命令行 REPL
//!
//! 每行一个用户输入，跑完一轮（或失败）后才读下一行；exit / quit / q 结束。
//! 动作调用与结果在轮次进行中实时打印，最终回答最后打印。

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::agent::Assistant;
use crate::memory::SessionId;
use crate::react::TurnEvent;

const PROMPT: &str = "> ";

pub fn is_exit_command(line: &str) -> bool {
    matches!(line.trim().to_lowercase().as_str(), "exit" | "quit" | "q")
}

async fn write_event<W: AsyncWrite + Unpin>(out: &mut W, ev: &TurnEvent) -> std::io::Result<()> {
    let line = match ev {
        TurnEvent::ActionCall { action, args, .. } => format!("  -> {action} {args}\n"),
        TurnEvent::ActionResult { action, ok, .. } => {
            format!("  <- {action}: {}\n", if *ok { "ok" } else { "failed" })
        }
        _ => return Ok(()),
    };
    out.write_all(line.as_bytes()).await?;
    out.flush().await
}

/// 读取 input 直到 EOF 或退出命令；所有轮次都在同一个会话中
pub async fn run_repl<R, W>(
    assistant: &Assistant,
    session: &SessionId,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let turn = assistant.run_turn_with_events(session, line, Some(&tx));
        tokio::pin!(turn);
        let result = loop {
            tokio::select! {
                r = &mut turn => break r,
                Some(ev) = rx.recv() => write_event(&mut output, &ev).await?,
            }
        };
        while let Ok(ev) = rx.try_recv() {
            write_event(&mut output, &ev).await?;
        }

        let text = match result {
            Ok(outcome) => format!("{}\n", outcome.answer),
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                format!("Error: {e}\n")
            }
        };
        output.write_all(text.as_bytes()).await?;
        output.flush().await?;
    }
    output.write_all(b"Bye.\n").await?;
    output.flush().await
}
