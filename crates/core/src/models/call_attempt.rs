use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 一次语音外呼尝试
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAttempt {
    pub id: i64,
    pub lead_id: i64,
    /// 每个线索内从1开始严格递增，不复用
    pub attempt_no: i32,
    /// 外部语音服务返回的呼叫句柄，webhook 回调用它关联
    pub call_handle: Option<String>,
    pub status: CallAttemptStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// 原始结局文本，仅用于诊断，不参与分支判断
    pub raw_outcome: Option<String>,
    /// 通话转写/分析载荷，原样存储
    pub transcript: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// 呼叫尝试状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum CallAttemptStatus {
    Dispatching,
    Dispatched,
    InCall,
    Ended,
    Failed,
}

impl CallAttempt {
    /// 创建新的呼叫尝试
    pub fn new(lead_id: i64, attempt_no: i32, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            id: 0, // 将由数据库生成
            lead_id,
            attempt_no,
            call_handle: None,
            status: CallAttemptStatus::Dispatching,
            scheduled_at,
            started_at: None,
            ended_at: None,
            raw_outcome: None,
            transcript: None,
            created_at: Utc::now(),
        }
    }

    /// 是否仍在途（已派发且尚未结束）
    pub fn is_in_flight(&self) -> bool {
        self.ended_at.is_none()
            && matches!(
                self.status,
                CallAttemptStatus::Dispatching
                    | CallAttemptStatus::Dispatched
                    | CallAttemptStatus::InCall
            )
    }

    /// 是否已结束（通话完成或派发失败）
    pub fn is_finished(&self) -> bool {
        matches!(self.status, CallAttemptStatus::Ended | CallAttemptStatus::Failed)
    }

    /// 更新状态并按需打时间戳
    pub fn update_status(&mut self, status: CallAttemptStatus) {
        self.status = status;
        match status {
            CallAttemptStatus::InCall => {
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
            }
            CallAttemptStatus::Ended | CallAttemptStatus::Failed => {
                if self.ended_at.is_none() {
                    self.ended_at = Some(Utc::now());
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_attempt_starts_in_flight() {
        let attempt = CallAttempt::new(1, 1, Utc::now());
        assert!(attempt.is_in_flight());
        assert!(!attempt.is_finished());
    }

    #[test]
    fn update_status_stamps_timestamps_once() {
        let mut attempt = CallAttempt::new(1, 1, Utc::now());
        attempt.update_status(CallAttemptStatus::InCall);
        let started = attempt.started_at;
        assert!(started.is_some());

        attempt.update_status(CallAttemptStatus::Ended);
        assert_eq!(attempt.started_at, started);
        assert!(attempt.ended_at.is_some());
        assert!(!attempt.is_in_flight());
    }
}
