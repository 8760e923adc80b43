//! 记忆层：对话消息模型、按会话分区的存储与持久化

pub mod conversation;
pub mod persistence;
pub mod store;

pub use conversation::{ActionRequest, Message, Role, SessionId};
pub use persistence::SqliteStore;
pub use store::{ConversationStore, InMemoryStore, StoreError};
