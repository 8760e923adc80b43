//! 任务调度：动作并发池
//!
//! 同一轮内模型一次请求的多个动作可并行执行，使用 Semaphore 限制同时进行的外部调用数。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct TaskScheduler {
    /// 动作并发限制（默认 4）
    action_semaphore: Arc<Semaphore>,
}

impl TaskScheduler {
    pub fn new(max_concurrent_actions: usize) -> Self {
        Self {
            action_semaphore: Arc::new(Semaphore::new(max_concurrent_actions.max(1))),
        }
    }

    /// 获取动作执行许可；信号量从不关闭，None 仅出现在关闭之后
    pub async fn acquire_action(&self) -> Option<OwnedSemaphorePermit> {
        self.action_semaphore.clone().acquire_owned().await.ok()
    }

    pub fn available(&self) -> usize {
        self.action_semaphore.available_permits()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_bounded() {
        let scheduler = TaskScheduler::new(2);
        let a = scheduler.acquire_action().await;
        let _b = scheduler.acquire_action().await;
        assert_eq!(scheduler.available(), 0);
        drop(a);
        assert_eq!(scheduler.available(), 1);
    }

    #[test]
    fn test_zero_is_clamped_to_one() {
        assert_eq!(TaskScheduler::new(0).available(), 1);
    }
}
