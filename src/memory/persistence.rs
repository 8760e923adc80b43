//! 对话持久化（SQLite）
//!
//! 每条消息一行，按 rowid 保序；action_requests 以 JSON 文本存储。
//! rusqlite 是同步 API，所有调用放到 spawn_blocking 中执行，连接由 Mutex 串行化。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection};

use crate::memory::{ActionRequest, ConversationStore, Message, Role, SessionId, StoreError};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开（必要时创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                action_requests TEXT,
                correlation_id TEXT,
                action_name TEXT,
                is_error INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Join("sqlite connection mutex poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn append(&self, session: &SessionId, message: Message) -> Result<(), StoreError> {
        let session = session.as_str().to_string();
        let requests = if message.action_requests.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&message.action_requests)?)
        };
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO messages
                 (session_id, role, content, action_requests, correlation_id, action_name, is_error, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    session,
                    message.role.as_str(),
                    message.content,
                    requests,
                    message.correlation_id,
                    message.action,
                    message.is_error,
                    chrono::Utc::now(),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn load(&self, session: &SessionId) -> Result<Vec<Message>, StoreError> {
        let session = session.as_str().to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT role, content, action_requests, correlation_id, action_name, is_error
                 FROM messages WHERE session_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![session], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, bool>(5)?,
                ))
            })?;

            let mut messages = Vec::new();
            for row in rows {
                let (role, content, requests, correlation_id, action, is_error) = row?;
                let role = Role::parse(&role)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown role '{role}'")))?;
                let action_requests: Vec<ActionRequest> = match requests {
                    Some(json) => serde_json::from_str(&json)?,
                    None => Vec::new(),
                };
                messages.push(Message {
                    role,
                    content,
                    action_requests,
                    correlation_id,
                    action,
                    is_error,
                });
            }
            Ok(messages)
        })
        .await
    }

    async fn len(&self, session: &SessionId) -> Result<usize, StoreError> {
        let session = session.as_str().to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                params![session],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requests_and_results_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("conv.db");
        let session = SessionId::from("thread-1");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.append(&session, Message::user("create demo")).await.unwrap();
            let req = ActionRequest::new(
                "call_1",
                "create_repo",
                serde_json::json!({"repoName": "demo"}),
            );
            store
                .append(&session, Message::assistant_with_requests("", vec![req]))
                .await
                .unwrap();
            store
                .append(
                    &session,
                    Message::action_result("call_1", "https://github.com/me/demo").with_outcome("create_repo", false),
                )
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load(&session).await.unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].action_requests[0].name, "create_repo");
        assert_eq!(loaded[1].action_requests[0].arguments["repoName"], "demo");
        assert_eq!(loaded[2].role, Role::ActionResult);
        assert_eq!(loaded[2].correlation_id.as_deref(), Some("call_1"));
        assert_eq!(loaded[2].action.as_deref(), Some("create_repo"));
        assert!(!loaded[2].is_error);
        assert_eq!(store.len(&session).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_sessions_do_not_leak() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append(&SessionId::from("a"), Message::user("a1")).await.unwrap();
        store.append(&SessionId::from("b"), Message::user("b1")).await.unwrap();
        let a = store.load(&SessionId::from("a")).await.unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].content, "a1");
        assert!(store.load(&SessionId::from("c")).await.unwrap().is_empty());
    }
}
