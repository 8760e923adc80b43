//! 交互界面：标准输入输出上的 REPL

pub mod repl;

pub use repl::{is_exit_command, run_repl};
