//! 线索接入与外呼派发
//!
//! 提交新线索后立即发起第一次外呼；扫描器和渠道意向回流复用同一个
//! 派发入口，保证尝试编号单调、在途检查一致、失败时状态回退。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};

use outreach_core::errors::{OutreachError, OutreachResult};
use outreach_core::models::{
    CallAttempt, CallAttemptStatus, ChannelPreference, Lead, LeadStatus,
};
use outreach_core::traits::{CallAttemptRepository, LeadRepository, VoiceDispatchGateway};

/// 新线索提交载荷
#[derive(Debug, Clone, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub messaging_handle: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    #[serde(default)]
    pub max_attempts: Option<i32>,
}

/// 入站消息解析出的渠道意向（解析由外部协作方完成）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelIntent {
    /// 对方要求电话联系，重新进入语音流程
    Voice,
    /// 对方选择继续异步沟通；resolved 表示对话已经解决
    Async { resolved: bool },
}

/// 线索接入服务
pub struct LeadIntakeService {
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    voice_gateway: Arc<dyn VoiceDispatchGateway>,
}

impl LeadIntakeService {
    pub fn new(
        lead_repo: Arc<dyn LeadRepository>,
        attempt_repo: Arc<dyn CallAttemptRepository>,
        voice_gateway: Arc<dyn VoiceDispatchGateway>,
    ) -> Self {
        Self {
            lead_repo,
            attempt_repo,
            voice_gateway,
        }
    }

    /// 提交新线索并立即发起第一次外呼
    ///
    /// 派发失败不影响提交本身：线索落库后回退到 dispatch-failed，
    /// 可以重新派发。
    pub async fn submit(&self, new_lead: NewLead) -> OutreachResult<Lead> {
        if new_lead.phone.trim().is_empty() {
            return Err(OutreachError::Internal("电话号码不能为空".to_string()));
        }

        let mut lead = Lead::new(new_lead.name, new_lead.phone);
        lead.messaging_handle = new_lead.messaging_handle;
        lead.city = new_lead.city;
        lead.specialty = new_lead.specialty;
        lead.reason = new_lead.reason;
        lead.utc_offset_minutes = new_lead.utc_offset_minutes;
        if let Some(max_attempts) = new_lead.max_attempts {
            if max_attempts > 0 {
                lead.max_attempts = max_attempts;
            }
        }

        let mut lead = self.lead_repo.create(&lead).await?;
        info!("新线索 {} 已创建: {}", lead.id, lead.name);

        if let Err(e) = self.dispatch_attempt(&mut lead).await {
            warn!("线索 {} 首次外呼派发失败: {}", lead.id, e);
        }

        Ok(lead)
    }

    /// 为线索派发一次新的外呼尝试
    ///
    /// 前置条件：线索当前状态允许进入 dispatching 且没有在途尝试。
    /// 网关异常时尝试记为失败、线索回退到 dispatch-failed，绝不
    /// 停留在中间状态。
    pub async fn dispatch_attempt(&self, lead: &mut Lead) -> OutreachResult<CallAttempt> {
        if self.attempt_repo.has_in_flight(lead.id).await? {
            return Err(OutreachError::AttemptInFlight { lead_id: lead.id });
        }

        lead.advance_to(LeadStatus::Dispatching)?;
        self.lead_repo.update(lead).await?;

        let attempt_no = self
            .attempt_repo
            .latest_for_lead(lead.id)
            .await?
            .map(|a| a.attempt_no)
            .unwrap_or(0)
            + 1;

        let attempt = CallAttempt::new(lead.id, attempt_no, Utc::now());
        let mut attempt = self.attempt_repo.create(&attempt).await?;

        let variables = self.dispatch_variables(lead, attempt_no);
        match self.voice_gateway.dispatch(&lead.phone, &variables).await {
            Ok(call_handle) => {
                attempt.call_handle = Some(call_handle);
                attempt.update_status(CallAttemptStatus::Dispatched);
                self.attempt_repo.update(&attempt).await?;

                lead.advance_to(LeadStatus::InProgress)?;
                self.lead_repo.update(lead).await?;

                info!(
                    "线索 {} 第 {} 次外呼已派发，呼叫句柄: {:?}",
                    lead.id, attempt_no, attempt.call_handle
                );
                Ok(attempt)
            }
            Err(e) => {
                attempt.update_status(CallAttemptStatus::Failed);
                attempt.raw_outcome = Some(format!("dispatch error: {e}"));
                if let Err(update_err) = self.attempt_repo.update(&attempt).await {
                    error!("记录失败尝试 {} 出错: {}", attempt.id, update_err);
                }

                lead.advance_to(LeadStatus::DispatchFailed)?;
                self.lead_repo.update(lead).await?;

                error!("线索 {} 第 {} 次外呼派发失败: {}", lead.id, attempt_no, e);
                Err(e)
            }
        }
    }

    /// 处理渠道意向信号
    pub async fn handle_channel_intent(
        &self,
        lead_id: i64,
        intent: ChannelIntent,
    ) -> OutreachResult<Lead> {
        let mut lead = self
            .lead_repo
            .get_by_id(lead_id)
            .await?
            .ok_or(OutreachError::LeadNotFound { id: lead_id })?;

        match intent {
            ChannelIntent::Voice => {
                lead.channel_preference = ChannelPreference::Voice;
                self.dispatch_attempt(&mut lead).await?;
            }
            ChannelIntent::Async { resolved } => {
                if resolved {
                    lead.advance_to(LeadStatus::Qualified)?;
                }
                // 未解决时维持 awaiting-channel-choice，继续异步沟通
                self.lead_repo.update(&lead).await?;
            }
        }

        Ok(lead)
    }

    /// 传给语音代理的动态变量（扁平字符串键值对）
    fn dispatch_variables(&self, lead: &Lead, attempt_no: i32) -> HashMap<String, String> {
        let mut variables = HashMap::new();
        variables.insert("lead_name".to_string(), lead.name.clone());
        variables.insert("attempt_no".to_string(), attempt_no.to_string());
        if let Some(city) = &lead.city {
            variables.insert("city".to_string(), city.clone());
        }
        if let Some(specialty) = &lead.specialty {
            variables.insert("specialty".to_string(), specialty.clone());
        }
        if let Some(reason) = &lead.reason {
            variables.insert("reason".to_string(), reason.clone());
        }
        variables
    }
}
