//! 动作执行器
//!
//! 持有 ActionRegistry、单次超时与并发池。execute 依次做：按名解析、按输入契约校验、
//! 在超时内调用；任何失败（未知动作、参数错误、协作方报错、超时、panic）都转成文本结果，
//! 从不向上抛出。每次调用输出一条结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::actions::{ActionRegistry, ActionSpec};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine, TaskScheduler};
use crate::memory::{ActionRequest, Message};

/// 一次动作调用的结果（成功输出或面向用户的失败说明）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub correlation_id: String,
    pub action: String,
    pub content: String,
    pub is_error: bool,
}

impl ActionResult {
    pub fn into_message(self) -> Message {
        Message::action_result(self.correlation_id, self.content).with_outcome(self.action, self.is_error)
    }
}

pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
    timeout: Duration,
    scheduler: TaskScheduler,
    recovery: RecoveryEngine,
}

impl ActionExecutor {
    pub fn new(registry: ActionRegistry, timeout_secs: u64) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout: Duration::from_secs(timeout_secs),
            scheduler: TaskScheduler::default(),
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_scheduler(mut self, scheduler: TaskScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn specs(&self) -> Vec<ActionSpec> {
        self.registry.specs()
    }

    pub fn action_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// 执行单个请求；返回值总是 ActionResult
    pub async fn execute(&self, request: &ActionRequest) -> ActionResult {
        let start = Instant::now();
        let (outcome, result) = self.dispatch(request).await;

        let audit = serde_json::json!({
            "event": "action_audit",
            "action": request.name,
            "correlation_id": request.id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&request.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "action");

        match result {
            Ok(value) => ActionResult {
                correlation_id: request.id.clone(),
                action: request.name.clone(),
                content: render_output(value),
                is_error: false,
            },
            Err(err) => {
                let content = match self.recovery.handle(&err) {
                    RecoveryAction::FeedBack(text) => text,
                    _ => format!("Error: {err}"),
                };
                ActionResult {
                    correlation_id: request.id.clone(),
                    action: request.name.clone(),
                    content,
                    is_error: true,
                }
            }
        }
    }

    /// 执行同一轮的全部请求：并发调度（受并发池限制），全部完成后按请求顺序返回
    pub async fn execute_all(&self, requests: &[ActionRequest]) -> Vec<ActionResult> {
        let tasks = requests.iter().map(|request| async move {
            let _permit = self.scheduler.acquire_action().await;
            self.execute(request).await
        });
        join_all(tasks).await
    }

    async fn dispatch(&self, request: &ActionRequest) -> (&'static str, Result<Value, AgentError>) {
        let action = match self.registry.resolve(&request.name) {
            Ok(action) => action,
            Err(e) => return ("unknown", Err(e)),
        };
        if let Err(e) = action.validate(&request.arguments) {
            return ("invalid", Err(e));
        }

        // 在独立任务中运行：超时后调用方不再等待，但动作本身不会被强行终止
        let args = request.arguments.clone();
        let mut handle = tokio::spawn(async move { action.invoke(args).await });
        match timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(value))) => ("ok", Ok(value)),
            Ok(Ok(Err(e))) => ("error", Err(e)),
            Ok(Err(join_err)) => (
                "panic",
                Err(AgentError::collaborator(
                    request.name.as_str(),
                    format!("action crashed: {}", panic_text(join_err)),
                )),
            ),
            Err(_) => {
                tracing::warn!(action = %request.name, "action timed out; left running in background");
                (
                    "timeout",
                    Err(AgentError::ActionTimeout {
                        action: request.name.clone(),
                        secs: self.timeout.as_secs(),
                    }),
                )
            }
        }
    }
}

fn panic_text(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

/// 字符串原样返回；其他结构按键排序后美化输出，保证同一结果渲染一致
pub fn render_output(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => {
            let canonical = canonicalize(other);
            serde_json::to_string_pretty(&canonical).unwrap_or_else(|_| canonical.to_string())
        }
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
