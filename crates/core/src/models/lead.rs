use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{OutreachError, OutreachResult};

/// 销售线索
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub messaging_handle: Option<String>,
    pub city: Option<String>,
    pub specialty: Option<String>,
    pub reason: Option<String>,
    pub channel_preference: ChannelPreference,
    /// 线索声明的本地时区（相对UTC的分钟偏移，东为正）
    pub utc_offset_minutes: Option<i32>,
    pub status: LeadStatus,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub max_attempts: i32,
    /// 最近一次已预约的未来咨询时间（由外部协作方维护）
    pub appointment_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 联系渠道偏好
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ChannelPreference {
    Voice,
    AsyncMessage,
}

/// 线索状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LeadStatus {
    New,
    Dispatching,
    InProgress,
    RetryPending,
    AsyncOutreach,
    AwaitingChannelChoice,
    IdentityMismatch,
    Qualified,
    DispatchFailed,
}

impl LeadStatus {
    /// 校验状态转换是否合法并返回目标状态
    ///
    /// 所有修改线索状态的调用点都必须经过这里，非法转换返回类型化错误
    /// 而不是任由调用方随意写字段。
    pub fn transition_to(self, target: LeadStatus) -> OutreachResult<LeadStatus> {
        use LeadStatus::*;

        let legal = matches!(
            (self, target),
            (New, Dispatching)
                | (Dispatching, InProgress)
                | (Dispatching, DispatchFailed)
                | (DispatchFailed, Dispatching)
                | (InProgress, RetryPending)
                | (InProgress, AsyncOutreach)
                | (InProgress, IdentityMismatch)
                | (InProgress, Qualified)
                | (RetryPending, Dispatching)
                | (RetryPending, AsyncOutreach)
                | (AsyncOutreach, AwaitingChannelChoice)
                | (AwaitingChannelChoice, Dispatching)
                | (AwaitingChannelChoice, Qualified)
        );

        if legal {
            Ok(target)
        } else {
            Err(OutreachError::IllegalTransition { from: self, to: target })
        }
    }

    /// 语音重试循环的终止状态
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Qualified | LeadStatus::IdentityMismatch)
    }
}

impl Lead {
    /// 创建新线索
    pub fn new(name: String, phone: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            name,
            phone,
            messaging_handle: None,
            city: None,
            specialty: None,
            reason: None,
            channel_preference: ChannelPreference::Voice,
            utc_offset_minutes: None,
            status: LeadStatus::New,
            next_retry_at: None,
            max_attempts: 3,
            appointment_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 状态转换，非 retry-pending 状态下强制清空 next_retry_at
    pub fn advance_to(&mut self, target: LeadStatus) -> OutreachResult<()> {
        self.status = self.status.transition_to(target)?;
        if target != LeadStatus::RetryPending {
            self.next_retry_at = None;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 进入重试等待并记录下一次拨打时间
    pub fn schedule_retry(&mut self, at: DateTime<Utc>) -> OutreachResult<()> {
        self.status = self.status.transition_to(LeadStatus::RetryPending)?;
        self.next_retry_at = Some(at);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 语音尝试用尽，升级到异步消息渠道
    pub fn escalate_to_async(&mut self) -> OutreachResult<()> {
        self.advance_to(LeadStatus::AsyncOutreach)?;
        self.channel_preference = ChannelPreference::AsyncMessage;
        Ok(())
    }

    /// 仍在未来的预约时间，过期预约不参与排程
    pub fn future_appointment(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.appointment_at.filter(|at| *at > now)
    }

    /// 异步渠道送达地址，没有专用句柄时退回电话号码
    pub fn messaging_address(&self) -> &str {
        self.messaging_handle.as_deref().unwrap_or(&self.phone)
    }
}
