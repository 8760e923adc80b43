//! 会话监管：同一会话的轮次串行化、取消令牌
//!
//! 每个会话一把异步互斥锁，保证同一会话的两轮不会并发执行；不同会话互不阻塞。
//! 根 CancellationToken 用于进程级取消，每轮从它派生子 token。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::memory::SessionId;

#[derive(Debug)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
    turn_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// 获取会话的轮次锁；持有期间同一会话的其它轮次会等待
    pub async fn lock_session(&self, session: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.turn_locks.lock().await;
            locks
                .entry(session.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// 触发取消：所有派生的轮次 token 都会收到
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// 创建子 token（用于单轮）
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_session_is_serialized() {
        let supervisor = Arc::new(SessionSupervisor::new());
        let session = SessionId::from("s1");
        let guard = supervisor.lock_session(&session).await;

        let sup = supervisor.clone();
        let s = session.clone();
        let waiter = tokio::spawn(async move {
            let _g = sup.lock_session(&s).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());
        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("second turn should proceed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_block() {
        let supervisor = SessionSupervisor::new();
        let _a = supervisor.lock_session(&SessionId::from("a")).await;
        let b = tokio::time::timeout(
            Duration::from_millis(200),
            supervisor.lock_session(&SessionId::from("b")),
        )
        .await;
        assert!(b.is_ok());
    }

    #[test]
    fn test_child_token_follows_parent() {
        let supervisor = SessionSupervisor::new();
        let child = supervisor.child_token();
        supervisor.cancel();
        assert!(child.is_cancelled());
    }
}
