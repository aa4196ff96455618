//! 重试排程
//!
//! 根据尝试次数、结局类型、线索时区和已预约时间计算下一次允许的
//! 外呼时刻，或给出"不再语音重试、升级异步渠道"的信号。
//! 所有时段计算在线索声明的本地时区进行，存储的时间戳一律为UTC。

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Timelike, Utc, Weekday};
use tracing::warn;

use outreach_core::config::RetryPolicyConfig;
use outreach_core::models::Lead;

use crate::outcome::CallOutcome;

/// 可注入的随机源
///
/// 排程抖动不直接调用全局RNG，测试里注入固定实现就能断言精确边界。
pub trait RandomSource: Send + Sync {
    /// 在 [lo, hi) 区间均匀采样
    fn uniform(&self, lo: f64, hi: f64) -> f64;
}

/// 生产实现，走线程本地RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn uniform(&self, lo: f64, hi: f64) -> f64 {
        lo + rand::random::<f64>() * (hi - lo)
    }
}

/// 重试决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 在给定UTC时刻再次外呼
    RetryAt(DateTime<Utc>),
    /// 语音尝试用尽，升级到异步渠道
    EscalateAsync,
    /// 终局结局，语音重试循环结束
    NoRetry,
}

/// 重试排程器
pub struct RetryScheduler {
    policy: RetryPolicyConfig,
    random: Arc<dyn RandomSource>,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicyConfig, random: Arc<dyn RandomSource>) -> Self {
        Self { policy, random }
    }

    pub fn policy(&self) -> &RetryPolicyConfig {
        &self.policy
    }

    /// 决定第 next_attempt_no 次尝试何时进行
    pub fn decide(
        &self,
        next_attempt_no: i32,
        outcome: &CallOutcome,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> RetryDecision {
        match outcome {
            CallOutcome::IdentityMismatch | CallOutcome::ResolvedOther => RetryDecision::NoRetry,
            CallOutcome::NoHumanReached { voicemail } => {
                if next_attempt_no > lead.max_attempts {
                    return RetryDecision::EscalateAsync;
                }
                if *voicemail {
                    // 趁对方刚看到未接来电尽快回拨，不受营业时段约束
                    RetryDecision::RetryAt(self.voicemail_callback(now))
                } else {
                    RetryDecision::RetryAt(self.next_business_slot(now, lead))
                }
            }
        }
    }

    /// 语音信箱短回拨：now + [min, max) 分钟
    fn voicemail_callback(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let minutes = self.random.uniform(
            self.policy.voicemail_min_minutes as f64,
            self.policy.voicemail_max_minutes as f64,
        );
        now + Duration::seconds((minutes * 60.0) as i64)
    }

    /// 常规重试槽位：now + lookahead 压入下一个有效营业窗口，
    /// 与已预约咨询过近时顺延到下一个营业日开门
    pub fn next_business_slot(&self, now: DateTime<Utc>, lead: &Lead) -> DateTime<Utc> {
        let offset = self.lead_offset(lead);
        let candidate =
            (now + Duration::hours(self.policy.lookahead_hours)).with_timezone(&offset);
        let mut slot = self.clamp_to_business_window(candidate);

        if let Some(appointment) = lead.future_appointment(now) {
            let buffer = Duration::hours(self.policy.appointment_buffer_hours);
            let gap = (slot.with_timezone(&Utc) - appointment).abs();
            if gap < buffer {
                slot = self.open_of_next_business_day(slot);
            }
        }

        slot.with_timezone(&Utc)
    }

    /// 线索本地时区，未声明时回退到缺省偏移
    fn lead_offset(&self, lead: &Lead) -> FixedOffset {
        let minutes = lead.utc_offset_minutes.unwrap_or_else(|| {
            warn!("线索 {} 未声明时区，使用缺省偏移", lead.id);
            self.policy.default_utc_offset_minutes
        });
        FixedOffset::east_opt(minutes * 60)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("零偏移必然有效"))
    }

    fn is_business_day(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Sun => false,
            Weekday::Sat => self.policy.include_saturday,
            _ => true,
        }
    }

    /// 把候选时刻压进 营业日 open..close 窗口
    fn clamp_to_business_window(&self, candidate: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let mut slot = candidate;
        loop {
            if !self.is_business_day(slot.weekday()) {
                slot = self.open_of_day(slot + Duration::days(1));
                continue;
            }
            if slot.hour() < self.policy.open_hour {
                return self.open_of_day(slot);
            }
            if slot.hour() >= self.policy.close_hour {
                slot = self.open_of_day(slot + Duration::days(1));
                continue;
            }
            return slot;
        }
    }

    fn open_of_day(&self, reference: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let open = reference
            .date_naive()
            .and_hms_opt(self.policy.open_hour, 0, 0)
            .unwrap_or_else(|| reference.naive_local());
        match open.and_local_timezone(*reference.offset()) {
            chrono::LocalResult::Single(dt) => dt,
            _ => reference,
        }
    }

    fn open_of_next_business_day(&self, reference: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let mut slot = self.open_of_day(reference + Duration::days(1));
        while !self.is_business_day(slot.weekday()) {
            slot = self.open_of_day(slot + Duration::days(1));
        }
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use outreach_core::models::{ChannelPreference, LeadStatus};

    /// 固定随机源，永远返回区间中点
    struct MidpointRandom;

    impl RandomSource for MidpointRandom {
        fn uniform(&self, lo: f64, hi: f64) -> f64 {
            (lo + hi) / 2.0
        }
    }

    fn scheduler() -> RetryScheduler {
        RetryScheduler::new(RetryPolicyConfig::default(), Arc::new(MidpointRandom))
    }

    fn lead_with_offset(offset_minutes: i32) -> Lead {
        Lead {
            id: 1,
            name: "Ana Torres".to_string(),
            phone: "+5215512345678".to_string(),
            messaging_handle: None,
            city: None,
            specialty: None,
            reason: None,
            channel_preference: ChannelPreference::Voice,
            utc_offset_minutes: Some(offset_minutes),
            status: LeadStatus::InProgress,
            next_retry_at: None,
            max_attempts: 3,
            appointment_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    /// 本地时刻（UTC-5）换算成UTC
    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn voicemail_schedules_inside_short_window() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        let now = Utc::now();

        let decision = sched.decide(2, &CallOutcome::NoHumanReached { voicemail: true }, &lead, now);
        let RetryDecision::RetryAt(at) = decision else {
            panic!("expected RetryAt, got {decision:?}");
        };

        let offset = at - now;
        assert!(offset > Duration::minutes(15), "offset was {offset}");
        assert!(offset < Duration::minutes(25), "offset was {offset}");
    }

    #[test]
    fn weekday_inside_window_keeps_two_hour_lookahead() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        // 周三本地 10:00 -> 候选 12:00，窗口内不动
        let now = local(2025, 6, 4, 10, 0);

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 4, 12, 0));
    }

    #[test]
    fn early_morning_clamps_to_open() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        // 周三本地 05:00 -> 候选 07:00，早于开门，压到 08:00
        let now = local(2025, 6, 4, 5, 0);

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 4, 8, 0));
    }

    #[test]
    fn late_evening_rolls_to_next_morning() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        // 周三本地 19:00 -> 候选 21:00，过了收盘，滚到周四 08:00
        let now = local(2025, 6, 4, 19, 0);

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 5, 8, 0));
    }

    #[test]
    fn saturday_evening_skips_sunday() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        // 周六本地 19:00 -> 候选 21:00 -> 周日不营业 -> 周一 08:00
        let now = local(2025, 6, 7, 19, 0);

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 9, 8, 0));
    }

    #[test]
    fn sunday_rolls_to_monday_open() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        let now = local(2025, 6, 8, 10, 0);

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 9, 8, 0));
    }

    #[test]
    fn saturday_counts_as_business_day_by_default() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        // 周六本地 09:30 -> 候选 11:30，周六营业，保持
        let now = local(2025, 6, 7, 9, 30);

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 7, 11, 30));
    }

    #[test]
    fn appointment_conflict_pushes_to_next_business_day() {
        let sched = scheduler();
        let mut lead = lead_with_offset(-300);
        // 周六本地 17:30 -> 候选 19:30；预约在当天 20:15，间隔 45 分钟 < 2 小时
        let now = local(2025, 6, 7, 17, 30);
        lead.appointment_at = Some(local(2025, 6, 7, 20, 15));

        let slot = sched.next_business_slot(now, &lead);
        // 周日跳过，落在周一 08:00
        assert_eq!(slot, local(2025, 6, 9, 8, 0));
    }

    #[test]
    fn past_appointment_is_ignored() {
        let sched = scheduler();
        let mut lead = lead_with_offset(-300);
        let now = local(2025, 6, 4, 10, 0);
        lead.appointment_at = Some(local(2025, 6, 4, 9, 0));

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 4, 12, 0));
    }

    #[test]
    fn missing_timezone_falls_back_to_default_offset() {
        let sched = scheduler();
        let mut lead = lead_with_offset(0);
        lead.utc_offset_minutes = None;
        // 缺省偏移是 -300，行为应与声明 UTC-5 的线索一致
        let now = local(2025, 6, 4, 10, 0);

        let slot = sched.next_business_slot(now, &lead);
        assert_eq!(slot, local(2025, 6, 4, 12, 0));
    }

    #[test]
    fn exhausted_attempts_escalate_to_async() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);

        let decision = sched.decide(
            4,
            &CallOutcome::NoHumanReached { voicemail: false },
            &lead,
            Utc::now(),
        );
        assert_eq!(decision, RetryDecision::EscalateAsync);

        // 语音信箱路径同样受次数上限约束
        let decision = sched.decide(
            4,
            &CallOutcome::NoHumanReached { voicemail: true },
            &lead,
            Utc::now(),
        );
        assert_eq!(decision, RetryDecision::EscalateAsync);
    }

    #[test]
    fn terminal_outcomes_never_retry() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        let now = Utc::now();

        assert_eq!(
            sched.decide(2, &CallOutcome::IdentityMismatch, &lead, now),
            RetryDecision::NoRetry
        );
        assert_eq!(
            sched.decide(2, &CallOutcome::ResolvedOther, &lead, now),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn business_slot_always_lands_in_window() {
        let sched = scheduler();
        let lead = lead_with_offset(-300);
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();

        // 一整周每小时扫一遍，槽位必须全部落在周一到周六 08:00-20:00
        let mut now = local(2025, 6, 2, 0, 0);
        let end = local(2025, 6, 9, 0, 0);
        while now < end {
            let slot = sched.next_business_slot(now, &lead).with_timezone(&offset);
            assert_ne!(slot.weekday(), Weekday::Sun, "now={now}");
            assert!(slot.hour() >= 8 && slot.hour() < 20, "now={now} slot={slot}");
            assert!(slot.with_timezone(&Utc) > now, "slot must be in the future");
            now += Duration::hours(1);
        }
    }
}
