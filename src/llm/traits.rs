//! 决策引擎抽象
//!
//! 所有后端（OpenAI 兼容 / DeepSeek / 离线 / 脚本化）实现 DecisionEngine：给定完整历史与可用动作，
//! 返回「最终回答」或「一组动作请求」二选一。

use async_trait::async_trait;

use crate::actions::ActionSpec;
use crate::memory::{ActionRequest, Message};

/// 一次决策的结果（封闭的二选一）
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    FinalAnswer(String),
    /// 同一轮可以请求多个动作；请求列表非空
    ActionsRequested(Vec<ActionRequest>),
}

#[async_trait]
pub trait DecisionEngine: Send + Sync {
    /// 单次调用推理服务；Err 表示服务不可达、鉴权失败等，整轮中止
    async fn decide(
        &self,
        history: &[Message],
        actions: &[ActionSpec],
    ) -> Result<DecisionOutcome, String>;

    /// 累计 token 使用：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
