//! LLM 层：决策引擎抽象与实现（OpenAI 兼容 / DeepSeek / 离线 / 脚本化）

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

pub use deepseek::{create_deepseek_engine, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use mock::{OfflineEngine, ScriptedEngine, OFFLINE_HINT};
pub use openai::{OpenAiEngine, TokenUsage, DEFAULT_SYSTEM_PROMPT};
pub use traits::{DecisionEngine, DecisionOutcome};
