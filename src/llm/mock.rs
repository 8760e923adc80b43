//! 无需 API 的决策引擎
//!
//! - ScriptedEngine：按脚本依次返回结果（或故障），并记录每次调用时看到的历史，用于测试编排循环
//! - OfflineEngine：未配置 API Key 时的后备，直接给出配置提示

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::actions::ActionSpec;
use crate::llm::{DecisionEngine, DecisionOutcome};
use crate::memory::{ActionRequest, Message};

type Scripted = Result<DecisionOutcome, String>;

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Scripted>>,
    /// 脚本耗尽后反复返回的结果；None 时返回故障
    repeat: Option<Scripted>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, text: impl Into<String>) -> Self {
        self.push(Ok(DecisionOutcome::FinalAnswer(text.into())))
    }

    pub fn request(self, requests: Vec<ActionRequest>) -> Self {
        self.push(Ok(DecisionOutcome::ActionsRequested(requests)))
    }

    pub fn fail(self, reason: impl Into<String>) -> Self {
        self.push(Err(reason.into()))
    }

    /// 脚本耗尽后一直返回该结果
    pub fn then_repeat(mut self, outcome: DecisionOutcome) -> Self {
        self.repeat = Some(Ok(outcome));
        self
    }

    fn push(self, item: Scripted) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
        self
    }

    /// 每次 decide 调用时的完整历史
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl DecisionEngine for ScriptedEngine {
    async fn decide(
        &self,
        history: &[Message],
        _actions: &[ActionSpec],
    ) -> Result<DecisionOutcome, String> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(history.to_vec());
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(item) => item,
            None => self
                .repeat
                .clone()
                .unwrap_or_else(|| Err("script exhausted".to_string())),
        }
    }
}

/// 离线后备：不调用任何服务，提示如何配置
#[derive(Debug, Default)]
pub struct OfflineEngine;

pub const OFFLINE_HINT: &str = "No reasoning service is configured, so I cannot act on requests yet. \
Set OPENAI_API_KEY (or DEEPSEEK_API_KEY with [llm].provider = \"deepseek\") and restart.";

#[async_trait]
impl DecisionEngine for OfflineEngine {
    async fn decide(
        &self,
        _history: &[Message],
        _actions: &[ActionSpec],
    ) -> Result<DecisionOutcome, String> {
        Ok(DecisionOutcome::FinalAnswer(OFFLINE_HINT.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_repeat() {
        let engine = ScriptedEngine::new()
            .fail("unreachable")
            .then_repeat(DecisionOutcome::FinalAnswer("again".to_string()));
        assert_eq!(engine.decide(&[], &[]).await, Err("unreachable".to_string()));
        assert_eq!(
            engine.decide(&[Message::user("hi")], &[]).await,
            Ok(DecisionOutcome::FinalAnswer("again".to_string()))
        );
        assert_eq!(engine.calls(), 2);
        assert_eq!(engine.histories()[1].len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_fault() {
        let engine = ScriptedEngine::new();
        assert!(engine.decide(&[], &[]).await.is_err());
    }
}
