//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction：动作级错误回灌给模型，推理服务错误中止本轮，
//! 超出轮数上限则合成最终回复。

use crate::core::{AgentError, RecoveryAction};

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::Validation { .. }
            | AgentError::UnknownAction(_)
            | AgentError::Collaborator { .. }
            | AgentError::ActionTimeout { .. } => RecoveryAction::FeedBack(format!("Error: {err}")),
            AgentError::LoopBoundExceeded(rounds) => RecoveryAction::SynthesizeAnswer(format!(
                "I could not complete this request: it still needed more actions after {rounds} rounds. \
                 Please narrow the request or try again."
            )),
            AgentError::Engine(_)
            | AgentError::Store(_)
            | AgentError::Cancelled
            | AgentError::DuplicateAction(_) => RecoveryAction::AbortTurn,
        }
    }
}
