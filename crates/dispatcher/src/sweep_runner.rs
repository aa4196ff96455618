//! 扫描循环
//!
//! 显式的执行器组件：自己持有两个独立的定时器（重试通道和异步
//! 提示通道），依赖全部注入，可以用假件单独测试一次扫描。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};

use outreach_core::config::SweepConfig;

use crate::sweep_service::SweepService;

/// 周期扫描执行器
pub struct SweepRunner {
    sweep: Arc<SweepService>,
    retry_interval: Duration,
    prompt_interval: Duration,
}

impl SweepRunner {
    pub fn new(sweep: Arc<SweepService>, config: &SweepConfig) -> Self {
        Self {
            sweep,
            retry_interval: Duration::from_secs(config.retry_interval_seconds),
            prompt_interval: Duration::from_secs(config.prompt_interval_seconds),
        }
    }

    /// 运行扫描循环直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut retry_tick = tokio::time::interval(self.retry_interval);
        let mut prompt_tick = tokio::time::interval(self.prompt_interval);

        info!(
            "扫描循环启动，重试间隔 {:?}，异步提示间隔 {:?}",
            self.retry_interval, self.prompt_interval
        );

        loop {
            tokio::select! {
                _ = retry_tick.tick() => {
                    if let Err(e) = self.sweep.run_retry_pass().await {
                        error!("重试扫描失败: {}", e);
                    }
                }
                _ = prompt_tick.tick() => {
                    if let Err(e) = self.sweep.run_prompt_pass().await {
                        error!("异步渠道扫描失败: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("扫描循环收到关闭信号");
                    break;
                }
            }
        }
    }
}
