//! 编排主循环
//!
//! 追加用户消息 -> 决策 -> 最终回答则结束；请求动作则追加带请求的 assistant 消息、
//! 全部执行完毕后按请求顺序追加结果，再回到决策。每轮最多 max_rounds 次往返，
//! 超出后合成一条最终回复。决策失败时整轮中止，历史只多出那条用户消息。

use std::collections::HashSet;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::actions::ActionExecutor;
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::{DecisionEngine, DecisionOutcome};
use crate::memory::{ActionRequest, ConversationStore, Message, SessionId};
use crate::react::TurnEvent;

/// 默认每轮最多的决策/动作往返次数
pub const DEFAULT_MAX_ROUNDS: usize = 8;
/// 动作结果预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;
/// 推理服务既没给回答也没请求动作时的回复
pub const EMPTY_ANSWER_FALLBACK: &str =
    "I have nothing further to add. Could you rephrase or give more detail?";

/// 一轮的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub answer: String,
    /// 执行过动作的往返次数
    pub rounds: usize,
    /// 是否因达到往返上限而合成的回答
    pub bounded: bool,
}

/// 一轮所需的协作方
pub struct ReactSession<'a> {
    pub engine: &'a dyn DecisionEngine,
    pub executor: &'a ActionExecutor,
    pub store: &'a dyn ConversationStore,
    pub recovery: &'a RecoveryEngine,
    pub cancel_token: CancellationToken,
    pub max_rounds: usize,
    pub event_tx: Option<&'a UnboundedSender<TurnEvent>>,
}

impl<'a> ReactSession<'a> {
    pub fn new(
        engine: &'a dyn DecisionEngine,
        executor: &'a ActionExecutor,
        store: &'a dyn ConversationStore,
        recovery: &'a RecoveryEngine,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            engine,
            executor,
            store,
            recovery,
            cancel_token,
            max_rounds: DEFAULT_MAX_ROUNDS,
            event_tx: None,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<TurnEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send(&self, ev: TurnEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }

    async fn append(&self, session_id: &SessionId, message: Message) -> Result<(), AgentError> {
        self.store
            .append(session_id, message)
            .await
            .map_err(|e| AgentError::Store(e.to_string()))
    }

    async fn finish(
        &self,
        session_id: &SessionId,
        answer: String,
        rounds: usize,
        bounded: bool,
        usage_before: (u64, u64, u64),
    ) -> Result<TurnOutcome, AgentError> {
        let answer = if answer.trim().is_empty() {
            tracing::warn!(session = %session_id, "empty answer from reasoning service, using fallback");
            EMPTY_ANSWER_FALLBACK.to_string()
        } else {
            answer
        };
        self.append(session_id, Message::assistant(answer.clone())).await?;
        let (p, c, t) = self.engine.token_usage();
        let (p0, c0, t0) = usage_before;
        if t > t0 {
            tracing::info!(prompt = p - p0, completion = c - c0, total = t - t0, "turn token usage");
            self.send(TurnEvent::TokenUsage {
                prompt_tokens: p - p0,
                completion_tokens: c - c0,
                total_tokens: t - t0,
            });
        }
        self.send(TurnEvent::FinalAnswer {
            text: answer.clone(),
            bounded,
        });
        Ok(TurnOutcome {
            answer,
            rounds,
            bounded,
        })
    }
}

/// 保证同一批请求的关联 id 非空且互不相同（部分服务不返回 id）
fn assign_correlation_ids(requests: Vec<ActionRequest>) -> Vec<ActionRequest> {
    let mut seen = HashSet::new();
    requests
        .into_iter()
        .map(|mut r| {
            if r.id.is_empty() || !seen.insert(r.id.clone()) {
                r.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                seen.insert(r.id.clone());
            }
            r
        })
        .collect()
}

fn preview(text: &str) -> String {
    if text.chars().count() > RESULT_PREVIEW_CHARS {
        format!("{}...", text.chars().take(RESULT_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}

/// 跑完一轮：返回最终回答；只有决策失败、存储失败或取消才返回 Err
pub async fn run_turn(
    session: &ReactSession<'_>,
    session_id: &SessionId,
    user_input: &str,
) -> Result<TurnOutcome, AgentError> {
    let usage_before = session.engine.token_usage();
    let specs = session.executor.specs();
    tracing::info!(session = %session_id, "turn started");
    session.append(session_id, Message::user(user_input)).await?;

    let mut rounds = 0;
    while rounds < session.max_rounds {
        session.send(TurnEvent::RoundStarted {
            round: rounds + 1,
            max_rounds: session.max_rounds,
        });
        // 取消只在挂起点之间生效；已开始的动作不会被打断
        if session.cancel_token.is_cancelled() {
            session.send(TurnEvent::Error {
                text: "Cancelled".to_string(),
            });
            return Err(AgentError::Cancelled);
        }

        let history = session
            .store
            .load(session_id)
            .await
            .map_err(|e| AgentError::Store(e.to_string()))?;

        session.send(TurnEvent::Thinking);
        let decision = tokio::select! {
            biased;
            _ = session.cancel_token.cancelled() => {
                session.send(TurnEvent::Error { text: "Cancelled".to_string() });
                return Err(AgentError::Cancelled);
            }
            d = session.engine.decide(&history, &specs) => d,
        };

        let requests = match decision {
            Err(reason) => {
                let err = AgentError::Engine(reason);
                tracing::warn!(session = %session_id, error = %err, "decision failed, aborting turn");
                if let RecoveryAction::AbortTurn = session.recovery.handle(&err) {
                    session.send(TurnEvent::Recovery {
                        action: "abort_turn".to_string(),
                        detail: err.to_string(),
                    });
                }
                session.send(TurnEvent::Error {
                    text: err.to_string(),
                });
                return Err(err);
            }
            Ok(DecisionOutcome::FinalAnswer(text)) => {
                tracing::info!(session = %session_id, rounds, "final answer");
                return session
                    .finish(session_id, text, rounds, false, usage_before)
                    .await;
            }
            Ok(DecisionOutcome::ActionsRequested(requests)) if requests.is_empty() => {
                return session
                    .finish(session_id, String::new(), rounds, false, usage_before)
                    .await;
            }
            Ok(DecisionOutcome::ActionsRequested(requests)) => assign_correlation_ids(requests),
        };

        tracing::info!(
            session = %session_id,
            round = rounds + 1,
            actions = ?requests.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            "actions requested"
        );
        session
            .append(
                session_id,
                Message::assistant_with_requests(String::new(), requests.clone()),
            )
            .await?;
        for r in &requests {
            session.send(TurnEvent::ActionCall {
                id: r.id.clone(),
                action: r.name.clone(),
                args: r.arguments.clone(),
            });
        }

        // 同一批请求全部完成后才继续；结果按请求顺序写回。
        // 某条写入失败时其余结果照常写入，尽量保持请求与结果配对，最后再报错。
        let results = session.executor.execute_all(&requests).await;
        let mut store_error = None;
        for result in results {
            session.send(TurnEvent::ActionResult {
                id: result.correlation_id.clone(),
                action: result.action.clone(),
                ok: !result.is_error,
                preview: preview(&result.content),
            });
            let correlation_id = result.correlation_id.clone();
            if let Err(e) = session.append(session_id, result.into_message()).await {
                tracing::error!(session = %session_id, correlation_id = %correlation_id, error = %e, "failed to store action result");
                if store_error.is_none() {
                    store_error = Some(e);
                }
            }
        }
        if let Some(e) = store_error {
            return Err(e);
        }
        rounds += 1;
    }

    let err = AgentError::LoopBoundExceeded(rounds);
    tracing::warn!(session = %session_id, rounds, "round limit reached");
    match session.recovery.handle(&err) {
        RecoveryAction::SynthesizeAnswer(text) => {
            session.send(TurnEvent::Recovery {
                action: "synthesize_answer".to_string(),
                detail: err.to_string(),
            });
            session.finish(session_id, text, rounds, true, usage_before).await
        }
        _ => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::actions::ActionRegistry;
    use crate::llm::ScriptedEngine;
    use crate::memory::{InMemoryStore, StoreError};

    /// 第 fail_at 次（从 1 计）append 失败，其余委托给内存存储
    struct FlakyStore {
        inner: InMemoryStore,
        appends: AtomicUsize,
        fail_at: usize,
    }

    #[async_trait]
    impl ConversationStore for FlakyStore {
        async fn append(&self, session: &SessionId, message: Message) -> Result<(), StoreError> {
            if self.appends.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
                return Err(StoreError::Corrupt("disk full".to_string()));
            }
            self.inner.append(session, message).await
        }

        async fn load(&self, session: &SessionId) -> Result<Vec<Message>, StoreError> {
            self.inner.load(session).await
        }
    }

    async fn turn_with(
        engine: &ScriptedEngine,
        store: &dyn ConversationStore,
        input: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let executor = ActionExecutor::new(ActionRegistry::new(), 5);
        let recovery = RecoveryEngine::new();
        let session = ReactSession::new(engine, &executor, store, &recovery, CancellationToken::new());
        run_turn(&session, &SessionId::new("loop"), input).await
    }

    #[tokio::test]
    async fn test_empty_answer_gets_fallback_text() {
        let store = InMemoryStore::new();
        let engine = ScriptedEngine::new().answer("  ").request(vec![]);

        let first = turn_with(&engine, &store, "hello").await.unwrap();
        assert_eq!(first.answer, EMPTY_ANSWER_FALLBACK);
        let second = turn_with(&engine, &store, "anything?").await.unwrap();
        assert_eq!(second.answer, EMPTY_ANSWER_FALLBACK);

        let history = store.load(&SessionId::new("loop")).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[1].content, EMPTY_ANSWER_FALLBACK);
    }

    #[tokio::test]
    async fn test_store_failure_still_writes_remaining_results() {
        // user=1, assistant=2, 第一条结果=3 写入失败
        let store = FlakyStore {
            inner: InMemoryStore::new(),
            appends: AtomicUsize::new(0),
            fail_at: 3,
        };
        let engine = ScriptedEngine::new()
            .request(vec![
                ActionRequest::new("c1", "missing_one", json!({})),
                ActionRequest::new("c2", "missing_two", json!({})),
            ])
            .answer("unreachable");

        let err = turn_with(&engine, &store, "go").await.unwrap_err();
        assert!(matches!(err, AgentError::Store(_)));

        let history = store.load(&SessionId::new("loop")).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].correlation_id.as_deref(), Some("c2"));
        assert_eq!(history[2].action.as_deref(), Some("missing_two"));
        assert!(history[2].is_error);
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_missing_and_duplicate_ids_are_replaced() {
        let requests = vec![
            ActionRequest::new("a", "x", json!({})),
            ActionRequest::new("", "x", json!({})),
            ActionRequest::new("a", "x", json!({})),
        ];
        let fixed = assign_correlation_ids(requests);
        assert_eq!(fixed[0].id, "a");
        assert!(fixed[1].id.starts_with("call_"));
        assert!(fixed[2].id.starts_with("call_"));
        assert_ne!(fixed[1].id, fixed[2].id);
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), RESULT_PREVIEW_CHARS + 3);
    }
}
