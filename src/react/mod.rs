//! 编排层：一轮对话内决策引擎与动作执行器之间的状态机

pub mod events;
pub mod loop_;

pub use events::TurnEvent;
pub use loop_::{run_turn, ReactSession, TurnOutcome, DEFAULT_MAX_ROUNDS, EMPTY_ANSWER_FALLBACK};
