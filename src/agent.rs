//! 助手运行时
//!
//! Assistant 持有决策引擎、动作执行器与会话存储，供 REPL 或其它前端按会话调用：
//! 同一会话的轮次串行执行；可选的轮次期限到点后取消（已开始的动作照常完成）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::actions::ActionExecutor;
use crate::core::{AgentError, RecoveryEngine, SessionSupervisor};
use crate::llm::DecisionEngine;
use crate::memory::{ConversationStore, Message, SessionId};
use crate::react::{run_turn, ReactSession, TurnEvent, TurnOutcome, DEFAULT_MAX_ROUNDS};

pub struct Assistant {
    engine: Arc<dyn DecisionEngine>,
    executor: Arc<ActionExecutor>,
    store: Arc<dyn ConversationStore>,
    supervisor: SessionSupervisor,
    recovery: RecoveryEngine,
    max_rounds: usize,
    turn_timeout: Option<Duration>,
}

impl Assistant {
    pub fn new(
        engine: Arc<dyn DecisionEngine>,
        executor: ActionExecutor,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            engine,
            executor: Arc::new(executor),
            store,
            supervisor: SessionSupervisor::new(),
            recovery: RecoveryEngine::new(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            turn_timeout: None,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// 单轮期限：到点后在下一个挂起点取消本轮
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn action_names(&self) -> Vec<String> {
        self.executor.action_names()
    }

    /// 跑一轮并返回最终回答
    pub async fn run_turn(&self, session: &SessionId, input: &str) -> Result<String, AgentError> {
        self.run_turn_with_events(session, input, None)
            .await
            .map(|outcome| outcome.answer)
    }

    pub async fn run_turn_with_events(
        &self,
        session: &SessionId,
        input: &str,
        event_tx: Option<&UnboundedSender<TurnEvent>>,
    ) -> Result<TurnOutcome, AgentError> {
        let _turn = self.supervisor.lock_session(session).await;
        let token = self.supervisor.child_token();

        let deadline = self.turn_timeout.map(|limit| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!(secs = limit.as_secs(), "turn deadline reached, cancelling");
                token.cancel();
            })
        });

        let mut react = ReactSession::new(
            self.engine.as_ref(),
            self.executor.as_ref(),
            self.store.as_ref(),
            &self.recovery,
            token,
        )
        .with_max_rounds(self.max_rounds);
        if let Some(tx) = event_tx {
            react = react.with_event_tx(tx);
        }

        let result = run_turn(&react, session, input).await;
        if let Some(handle) = deadline {
            handle.abort();
        }
        result
    }

    /// 会话的完整历史
    pub async fn history(&self, session: &SessionId) -> Result<Vec<Message>, AgentError> {
        self.store
            .load(session)
            .await
            .map_err(|e| AgentError::Store(e.to_string()))
    }

    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.engine.token_usage()
    }

    /// 取消所有进行中的轮次
    pub fn shutdown(&self) {
        self.supervisor.cancel();
    }
}
