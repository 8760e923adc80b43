//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 FeedBack（回灌给模型）/ AbortTurn / SynthesizeAnswer。

use thiserror::Error;

/// 一轮对话（Turn）或单次动作执行中可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// 参数不符合动作的输入契约；动作不会被执行
    #[error("Invalid arguments for '{action}': field '{field}' {reason}")]
    Validation {
        action: String,
        field: String,
        reason: String,
    },

    #[error("Unknown action: '{0}' is not a registered action")]
    UnknownAction(String),

    #[error("Duplicate action: '{0}' is already registered")]
    DuplicateAction(String),

    /// 外部协作方（GitHub API / git）失败：网络、鉴权、不存在、冲突等
    #[error("Action '{action}' failed: {reason}")]
    Collaborator { action: String, reason: String },

    #[error("Action '{action}' timed out after {secs}s (it may still complete in the background)")]
    ActionTimeout { action: String, secs: u64 },

    /// 推理服务调用失败（不可达、鉴权、超时等）；整轮中止
    #[error("Reasoning service error: {0}")]
    Engine(String),

    #[error("No final answer after {0} action rounds")]
    LoopBoundExceeded(usize),

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("Cancelled")]
    Cancelled,
}

impl AgentError {
    pub fn collaborator(action: impl Into<String>, reason: impl ToString) -> Self {
        Self::Collaborator {
            action: action.into(),
            reason: reason.to_string(),
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 作为失败的动作结果写回对话，由模型决定重试、换动作或直接回答
    FeedBack(String),
    /// 中止当前轮，历史保持不变，由调用方展示错误
    AbortTurn,
    /// 合成一条最终回复结束本轮
    SynthesizeAnswer(String),
}
