//! 呼叫生命周期事件处理
//!
//! webhook 边界完成鉴权和载荷规范化之后，事件进到这里：按呼叫句柄
//! 关联尝试记录、打时间戳、跑结局分类、驱动线索状态机，需要重试时
//! 调用排程器。对已结束的尝试重放事件是无操作，保证幂等。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use outreach_core::errors::OutreachResult;
use outreach_core::models::{
    CallAttempt, CallAttemptStatus, CallEventBody, CallEventKind, CallWebhookEvent, LeadStatus,
};
use outreach_core::traits::{CallAttemptRepository, LeadRepository};

use crate::outcome::{classify, CallOutcome};
use crate::retry_service::{RetryDecision, RetryScheduler};

/// 事件处理结果，全部都以成功应答，避免上游无限重投
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAck {
    /// 事件已处理并产生状态变化
    Processed,
    /// 呼叫句柄不认识，确认但忽略（陈旧或重放事件的常态）
    UnknownHandle,
    /// 尝试已结束，重复投递按无操作确认
    Duplicate,
    /// 事件无需或无法继续处理，确认但忽略
    Ignored,
}

/// 呼叫事件服务
pub struct CallEventService {
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    retry_scheduler: Arc<RetryScheduler>,
}

impl CallEventService {
    pub fn new(
        lead_repo: Arc<dyn LeadRepository>,
        attempt_repo: Arc<dyn CallAttemptRepository>,
        retry_scheduler: Arc<RetryScheduler>,
    ) -> Self {
        Self {
            lead_repo,
            attempt_repo,
            retry_scheduler,
        }
    }

    /// 处理一条 webhook 事件
    pub async fn handle_event(&self, event: &CallWebhookEvent) -> OutreachResult<EventAck> {
        match event.event {
            CallEventKind::CallStarted => self.handle_started(&event.call).await,
            CallEventKind::CallEnded => self.handle_ended(&event.call).await,
            CallEventKind::CallAnalyzed => self.handle_analyzed(&event.call).await,
            CallEventKind::Unknown => {
                debug!("忽略未知事件类型，呼叫句柄: {}", event.call.id);
                Ok(EventAck::Ignored)
            }
        }
    }

    async fn lookup_attempt(&self, call: &CallEventBody) -> OutreachResult<Option<CallAttempt>> {
        let attempt = self.attempt_repo.get_by_call_handle(&call.id).await?;
        if attempt.is_none() {
            debug!("呼叫句柄 {} 没有对应的尝试记录，忽略", call.id);
        }
        Ok(attempt)
    }

    async fn handle_started(&self, call: &CallEventBody) -> OutreachResult<EventAck> {
        let Some(mut attempt) = self.lookup_attempt(call).await? else {
            return Ok(EventAck::UnknownHandle);
        };
        if attempt.ended_at.is_some() {
            return Ok(EventAck::Duplicate);
        }

        attempt.update_status(CallAttemptStatus::InCall);
        self.attempt_repo.update(&attempt).await?;

        debug!("尝试 {} 通话开始", attempt.id);
        Ok(EventAck::Processed)
    }

    async fn handle_ended(&self, call: &CallEventBody) -> OutreachResult<EventAck> {
        let Some(mut attempt) = self.lookup_attempt(call).await? else {
            return Ok(EventAck::UnknownHandle);
        };
        // 幂等保护：已结束的尝试不再驱动任何转换
        if attempt.ended_at.is_some() {
            debug!("尝试 {} 已结束，重复的 call_ended 事件按无操作处理", attempt.id);
            return Ok(EventAck::Duplicate);
        }

        attempt.update_status(CallAttemptStatus::Ended);
        attempt.raw_outcome = call.raw_outcome_text();
        self.attempt_repo.update(&attempt).await?;

        let Some(mut lead) = self.lead_repo.get_by_id(attempt.lead_id).await? else {
            warn!("尝试 {} 对应的线索 {} 不存在", attempt.id, attempt.lead_id);
            return Ok(EventAck::Ignored);
        };

        let outcome = classify(call);
        let now = Utc::now();

        let transition = match outcome {
            CallOutcome::IdentityMismatch => lead.advance_to(LeadStatus::IdentityMismatch),
            CallOutcome::ResolvedOther => lead.advance_to(LeadStatus::Qualified),
            CallOutcome::NoHumanReached { .. } => {
                match self
                    .retry_scheduler
                    .decide(attempt.attempt_no + 1, &outcome, &lead, now)
                {
                    RetryDecision::RetryAt(at) => lead.schedule_retry(at),
                    RetryDecision::EscalateAsync => lead.escalate_to_async(),
                    RetryDecision::NoRetry => Ok(()),
                }
            }
        };

        match transition {
            Ok(()) => {
                self.lead_repo.update(&lead).await?;
                info!(
                    "线索 {} 第 {} 次呼叫结束，结局 {:?}，状态 {:?}",
                    lead.id, attempt.attempt_no, outcome, lead.status
                );
                Ok(EventAck::Processed)
            }
            Err(e) => {
                // 迟到的陈旧事件可能撞上已推进的状态机：确认但不改状态
                warn!("线索 {} 状态转换被拒绝: {}", lead.id, e);
                Ok(EventAck::Ignored)
            }
        }
    }

    async fn handle_analyzed(&self, call: &CallEventBody) -> OutreachResult<EventAck> {
        let Some(attempt) = self.lookup_attempt(call).await? else {
            return Ok(EventAck::UnknownHandle);
        };
        let Some(transcript) = &call.transcript else {
            debug!("call_analyzed 事件没有转写载荷，忽略");
            return Ok(EventAck::Ignored);
        };

        self.attempt_repo.store_transcript(attempt.id, transcript).await?;
        debug!("尝试 {} 转写已保存", attempt.id);
        Ok(EventAck::Processed)
    }
}
