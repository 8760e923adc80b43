//! 轮次过程事件：供 REPL 等前端实时展示动作调用与结果

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// 第几轮（决策 + 动作算一轮）
    RoundStarted { round: usize, max_rounds: usize },
    /// 正在等待推理服务
    Thinking,
    ActionCall {
        id: String,
        action: String,
        args: serde_json::Value,
    },
    /// 动作结果（预览，避免过长）
    ActionResult {
        id: String,
        action: String,
        ok: bool,
        preview: String,
    },
    /// 错误恢复动作（AbortTurn / SynthesizeAnswer）
    Recovery { action: String, detail: String },
    FinalAnswer { text: String, bounded: bool },
    /// 本轮 token 增量
    TokenUsage {
        prompt_tokens: u64,
        completion_tokens: u64,
        total_tokens: u64,
    },
    Error { text: String },
}
