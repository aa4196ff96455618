//! 周期扫描
//!
//! 重试通道：到期的 retry-pending 线索重新派发外呼。
//! 异步通道：async-outreach 线索发送渠道偏好询问。
//! 单个线索的失败只记日志，绝不中断整批。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use outreach_core::config::{RetryPolicyConfig, SweepConfig};
use outreach_core::errors::OutreachResult;
use outreach_core::models::{Lead, LeadStatus};
use outreach_core::traits::{CallAttemptRepository, LeadRepository, MessageGateway};

use crate::intake_service::LeadIntakeService;

/// 重试通道单次扫描统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetrySweepStats {
    pub dispatched: usize,
    pub escalated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 异步通道单次扫描统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PromptSweepStats {
    pub prompted: usize,
    pub failed: usize,
}

enum DueLeadAction {
    Dispatched,
    Escalated,
    Skipped,
}

/// 周期扫描服务
pub struct SweepService {
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    message_gateway: Arc<dyn MessageGateway>,
    intake: Arc<LeadIntakeService>,
    sweep_config: SweepConfig,
    retry_policy: RetryPolicyConfig,
    channel_prompt: String,
}

impl SweepService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lead_repo: Arc<dyn LeadRepository>,
        attempt_repo: Arc<dyn CallAttemptRepository>,
        message_gateway: Arc<dyn MessageGateway>,
        intake: Arc<LeadIntakeService>,
        sweep_config: SweepConfig,
        retry_policy: RetryPolicyConfig,
        channel_prompt: String,
    ) -> Self {
        Self {
            lead_repo,
            attempt_repo,
            message_gateway,
            intake,
            sweep_config,
            retry_policy,
            channel_prompt,
        }
    }

    /// 重试通道：派发所有到期的重试
    pub async fn run_retry_pass(&self) -> OutreachResult<RetrySweepStats> {
        let now = Utc::now();
        let due = self
            .lead_repo
            .get_due_retries(now, Some(self.sweep_config.batch_limit))
            .await?;

        if due.is_empty() {
            return Ok(RetrySweepStats::default());
        }

        debug!("本次扫描发现 {} 个到期重试线索", due.len());
        let mut stats = RetrySweepStats::default();

        for lead in due {
            let lead_id = lead.id;
            match self.process_due_lead(lead, now).await {
                Ok(DueLeadAction::Dispatched) => stats.dispatched += 1,
                Ok(DueLeadAction::Escalated) => stats.escalated += 1,
                Ok(DueLeadAction::Skipped) => stats.skipped += 1,
                Err(e) => {
                    stats.failed += 1;
                    error!("处理到期线索 {} 失败: {}", lead_id, e);
                }
            }
        }

        info!(
            "重试扫描完成: 派发 {} 升级 {} 跳过 {} 失败 {}",
            stats.dispatched, stats.escalated, stats.skipped, stats.failed
        );
        Ok(stats)
    }

    async fn process_due_lead(
        &self,
        mut lead: Lead,
        now: DateTime<Utc>,
    ) -> OutreachResult<DueLeadAction> {
        // 在途保护：上一次呼叫还没结束就绝不重复拨打
        if self.attempt_repo.has_in_flight(lead.id).await? {
            debug!("线索 {} 有在途呼叫，跳过", lead.id);
            return Ok(DueLeadAction::Skipped);
        }

        let latest = self.attempt_repo.latest_for_lead(lead.id).await?;

        if let Some(latest) = &latest {
            // 过期计时器保护：到期时间早于上次拨打开始，说明计时器
            // 不是上次呼叫的回调写的，距上次开始不足最小间隔时不拨。
            // 上次派发之后写入的计时器（语音信箱短回拨）以计时器为准。
            let last_start = latest.started_at.unwrap_or(latest.scheduled_at);
            let stale_timer = lead.next_retry_at.map(|at| at <= last_start).unwrap_or(false);
            if stale_timer
                && now - last_start < Duration::hours(self.retry_policy.min_attempt_gap_hours)
            {
                debug!("线索 {} 距上次拨打不足最小间隔，跳过", lead.id);
                return Ok(DueLeadAction::Skipped);
            }
        }

        let next_attempt_no = latest.map(|a| a.attempt_no).unwrap_or(0) + 1;
        if next_attempt_no > lead.max_attempts {
            // 次数已用尽：升级异步渠道，清空重试时间
            lead.escalate_to_async()?;
            self.lead_repo.update(&lead).await?;
            info!("线索 {} 语音尝试用尽，升级异步渠道", lead.id);
            return Ok(DueLeadAction::Escalated);
        }

        self.intake.dispatch_attempt(&mut lead).await?;
        Ok(DueLeadAction::Dispatched)
    }

    /// 异步通道：向等待外联的线索发送渠道偏好询问
    pub async fn run_prompt_pass(&self) -> OutreachResult<PromptSweepStats> {
        let leads = self.lead_repo.get_by_status(LeadStatus::AsyncOutreach).await?;

        if leads.is_empty() {
            return Ok(PromptSweepStats::default());
        }

        debug!("本次扫描发现 {} 个待异步外联线索", leads.len());
        let mut stats = PromptSweepStats::default();

        for mut lead in leads {
            let body = self.channel_prompt.replace("{name}", &lead.name);
            match self
                .message_gateway
                .send_text(lead.messaging_address(), &body)
                .await
            {
                Ok(()) => match lead.advance_to(LeadStatus::AwaitingChannelChoice) {
                    Ok(()) => {
                        if let Err(e) = self.lead_repo.update(&lead).await {
                            stats.failed += 1;
                            error!("更新线索 {} 状态失败: {}", lead.id, e);
                        } else {
                            stats.prompted += 1;
                        }
                    }
                    Err(e) => {
                        stats.failed += 1;
                        error!("线索 {} 状态转换失败: {}", lead.id, e);
                    }
                },
                Err(e) => {
                    // 发送失败的线索保持 async-outreach，下一轮重发
                    stats.failed += 1;
                    error!("向线索 {} 发送渠道询问失败: {}", lead.id, e);
                }
            }
        }

        info!("异步渠道扫描完成: 已询问 {} 失败 {}", stats.prompted, stats.failed);
        Ok(stats)
    }
}
