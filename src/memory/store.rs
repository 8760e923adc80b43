//! 会话存储抽象层
//!
//! 按 SessionId 分区的只追加消息日志；编排核心只依赖 ConversationStore，
//! 后端可以是内存（进程生命周期）或 SQLite（跨进程持久化）。

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::memory::{Message, SessionId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("background task failed: {0}")]
    Join(String),
}

/// 会话存储接口
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 追加一条消息；会话在第一次追加时隐式创建
    async fn append(&self, session: &SessionId, message: Message) -> Result<(), StoreError>;

    /// 按追加顺序读取会话的全部消息；未知会话返回空
    async fn load(&self, session: &SessionId) -> Result<Vec<Message>, StoreError>;

    async fn len(&self, session: &SessionId) -> Result<usize, StoreError> {
        Ok(self.load(session).await?.len())
    }
}

/// 内存会话存储
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<SessionId, Vec<Message>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn append(&self, session: &SessionId, message: Message) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .entry(session.clone())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn load(&self, session: &SessionId) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default())
    }

    async fn len(&self, session: &SessionId) -> Result<usize, StoreError> {
        Ok(self.sessions.read().await.get(session).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryStore::new();
        let s = SessionId::from("s");
        store.append(&s, Message::user("one")).await.unwrap();
        store.append(&s, Message::assistant("two")).await.unwrap();
        let loaded = store.load(&s).await.unwrap();
        let contents: Vec<_> = loaded.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two"]);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = InMemoryStore::new();
        store.append(&SessionId::from("a"), Message::user("for a")).await.unwrap();
        assert!(store.load(&SessionId::from("b")).await.unwrap().is_empty());
        assert_eq!(store.len(&SessionId::from("a")).await.unwrap(), 1);
    }
}
