//! Flow Sweeper - 空闲登录流程回收
//!
//! 后端只保留 15 分钟内的登录；超过空闲时间的流程从表中移除，
//! 并取消其控制器上仍在进行的轮询。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::LoginFlowRegistryPort;

/// Sweeper 配置
#[derive(Debug, Clone)]
pub struct FlowSweeperConfig {
    /// 两次扫描之间的间隔（秒）
    pub interval_secs: u64,
    /// 流程空闲超过该时长即被回收（秒）
    pub flow_expire_secs: u64,
}

impl Default for FlowSweeperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            flow_expire_secs: 900,
        }
    }
}

/// 登录流程回收器
pub struct FlowSweeper {
    config: FlowSweeperConfig,
    registry: Arc<dyn LoginFlowRegistryPort>,
}

impl FlowSweeper {
    pub fn new(config: FlowSweeperConfig, registry: Arc<dyn LoginFlowRegistryPort>) -> Self {
        Self { config, registry }
    }

    /// 执行一次扫描，返回回收的流程数量
    pub async fn sweep_once(&self) -> usize {
        let expired = self.registry.get_expired_flows(self.config.flow_expire_secs);
        let mut removed = 0;

        for flow_id in expired {
            match self.registry.remove(&flow_id) {
                Ok(flow) => {
                    flow.controller.cancel().await;
                    removed += 1;
                }
                // 并发请求可能已移除
                Err(e) => tracing::debug!(flow_id = %flow_id, error = %e, "Flow already gone"),
            }
        }

        if removed > 0 {
            tracing::info!(
                removed,
                remaining = self.registry.len(),
                "Expired login flows swept"
            );
        }
        removed
    }

    /// 启动回收循环，直到 shutdown 触发
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval_secs,
            flow_expire_secs = self.config.flow_expire_secs,
            "FlowSweeper started"
        );

        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
            }
        }

        tracing::info!("FlowSweeper stopped");
    }
}
