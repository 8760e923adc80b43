//! RepoPilot - 对话式 GitHub 仓库助手
//!
//! 模块划分：
//! - **actions**: 强类型动作、注册表、执行器与仓库动作目录
//! - **agent**: Assistant 运行时（按会话跑轮次）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、会话监管、并发调度、组件装配
//! - **integrations**: GitHub API（octocrab）、内存仓库托管、git 命令行
//! - **llm**: 决策引擎抽象与实现（OpenAI 兼容 / DeepSeek / 离线 / 脚本化）
//! - **memory**: 对话消息模型与按会话分区的存储（内存 / SQLite）
//! - **react**: 一轮对话内的编排循环
//! - **ui**: 标准输入输出 REPL

pub mod actions;
pub mod agent;
pub mod config;
pub mod core;
pub mod integrations;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod ui;

pub use agent::Assistant;
