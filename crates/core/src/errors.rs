use thiserror::Error;

use crate::models::LeadStatus;

/// 外呼系统错误类型定义
#[derive(Debug, Error)]
pub enum OutreachError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("线索未找到: {id}")]
    LeadNotFound { id: i64 },

    #[error("呼叫尝试未找到: {id}")]
    AttemptNotFound { id: i64 },

    #[error("非法状态转换: {from:?} -> {to:?}")]
    IllegalTransition { from: LeadStatus, to: LeadStatus },

    #[error("线索 {lead_id} 已有进行中的呼叫尝试")]
    AttemptInFlight { lead_id: i64 },

    #[error("外呼网关错误: {0}")]
    DispatchGateway(String),

    #[error("消息网关错误: {0}")]
    MessageGateway(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for OutreachError {
    fn from(err: serde_json::Error) -> Self {
        OutreachError::Serialization(err.to_string())
    }
}

pub type OutreachResult<T> = Result<T, OutreachError>;
