//! 可取消的轮询任务
//!
//! 轮询以显式的后台任务运行，持有 [`PollHandle`] 的一方可以随时取消。
//! 任务内部使用 `tokio::time`，测试中可通过暂停时钟确定性地推进。

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 轮询节奏配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// 两次轮询之间的间隔（毫秒）
    pub interval_ms: u64,
    /// 最大轮询次数
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 60,
        }
    }
}

impl PollConfig {
    pub fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// 后台轮询任务句柄
pub struct PollHandle<T> {
    cancel: CancellationToken,
    join: JoinHandle<T>,
}

impl<T: Send + 'static> PollHandle<T> {
    /// 启动任务，任务函数收到自己的取消令牌
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let join = tokio::spawn(task(cancel.clone()));
        Self { cancel, join }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 等待任务结束；任务 panic 或被中止时返回 None
    pub async fn join(self) -> Option<T> {
        match self.join.await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "Poll task did not complete");
                None
            }
        }
    }
}

/// 在取消令牌触发前睡眠；被取消时返回 false
pub async fn sleep_unless_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_loop_before_next_tick() {
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();

        let handle = PollHandle::spawn(move |cancel| async move {
            loop {
                if !sleep_unless_cancelled(&cancel, Duration::from_millis(100)).await {
                    return "cancelled";
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.join().await, Some("cancelled"));

        let seen = ticks.load(Ordering::SeqCst);
        assert_eq!(seen, 3);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_returns_value() {
        let handle = PollHandle::spawn(|_cancel| async { 42 });
        assert_eq!(handle.join().await, Some(42));
    }

    #[test]
    fn test_default_config() {
        let config = PollConfig::default();
        assert_eq!(config.interval(), Duration::from_millis(2000));
        assert_eq!(config.max_attempts, 60);
    }
}
