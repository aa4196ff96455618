//! 数据仓储层接口定义
//!
//! 线索与呼叫尝试两张表的持久化抽象。所有操作异步，返回
//! `OutreachResult<T>` 统一错误处理，实现 `Send + Sync` 保证线程安全。
//! 接口与实现分离，生产环境用 SQLite 实现，测试用内存实现。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::OutreachResult;
use crate::models::{CallAttempt, Lead, LeadStatus};

/// 线索仓储接口
#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// 创建线索，返回带数据库生成ID的实体
    async fn create(&self, lead: &Lead) -> OutreachResult<Lead>;

    async fn get_by_id(&self, id: i64) -> OutreachResult<Option<Lead>>;

    /// 整体回写线索（状态、重试时间、渠道偏好等）
    async fn update(&self, lead: &Lead) -> OutreachResult<()>;

    /// 到期待重试的线索：status = retry-pending 且 next_retry_at <= now
    async fn get_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> OutreachResult<Vec<Lead>>;

    async fn get_by_status(&self, status: LeadStatus) -> OutreachResult<Vec<Lead>>;
}

/// 呼叫尝试仓储接口
#[async_trait]
pub trait CallAttemptRepository: Send + Sync {
    /// 创建呼叫尝试，返回带数据库生成ID的实体
    async fn create(&self, attempt: &CallAttempt) -> OutreachResult<CallAttempt>;

    async fn get_by_id(&self, id: i64) -> OutreachResult<Option<CallAttempt>>;

    /// 按外部呼叫句柄查找，webhook 关联入口
    async fn get_by_call_handle(&self, call_handle: &str) -> OutreachResult<Option<CallAttempt>>;

    async fn get_by_lead_id(&self, lead_id: i64) -> OutreachResult<Vec<CallAttempt>>;

    /// 线索最近的一次尝试（attempt_no 最大者）
    async fn latest_for_lead(&self, lead_id: i64) -> OutreachResult<Option<CallAttempt>>;

    /// 线索是否存在在途尝试（已派发且未结束）
    async fn has_in_flight(&self, lead_id: i64) -> OutreachResult<bool>;

    /// 整体回写尝试记录
    async fn update(&self, attempt: &CallAttempt) -> OutreachResult<()>;

    /// 原样保存转写/分析载荷
    async fn store_transcript(
        &self,
        id: i64,
        transcript: &serde_json::Value,
    ) -> OutreachResult<()>;
}
