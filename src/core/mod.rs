//! 核心编排层：错误与恢复、会话监管、动作并发调度、组件装配

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod task_scheduler;

pub use error::{AgentError, RecoveryAction};
pub use orchestrator::{create_assistant, create_engine_from_config, create_repo_host, create_store};
pub use recovery::RecoveryEngine;
pub use session_supervisor::SessionSupervisor;
pub use task_scheduler::TaskScheduler;
