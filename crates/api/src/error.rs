use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use outreach_core::OutreachError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("外呼系统错误: {0}")]
    Outreach(#[from] OutreachError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            ApiError::Outreach(OutreachError::LeadNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("线索 ID {} 不存在", id),
                "LEAD_NOT_FOUND",
            ),
            ApiError::Outreach(OutreachError::AttemptNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("呼叫尝试 ID {} 不存在", id),
                "ATTEMPT_NOT_FOUND",
            ),
            ApiError::Outreach(OutreachError::IllegalTransition { from, to }) => (
                StatusCode::CONFLICT,
                format!("线索状态不允许该操作: {from:?} -> {to:?}"),
                "ILLEGAL_TRANSITION",
            ),
            ApiError::Outreach(OutreachError::AttemptInFlight { lead_id }) => (
                StatusCode::CONFLICT,
                format!("线索 {} 已有进行中的呼叫", lead_id),
                "ATTEMPT_IN_FLIGHT",
            ),
            ApiError::Outreach(OutreachError::DispatchGateway(msg)) => (
                StatusCode::BAD_GATEWAY,
                format!("外呼网关不可用: {msg}"),
                "DISPATCH_GATEWAY_ERROR",
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
            ApiError::Outreach(_) | ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
