use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use outreach_dispatcher::{ChannelIntent, NewLead};

use crate::{
    error::{ApiError, ApiResult},
    response::{created, success},
    routes::AppState,
};

/// 渠道意向回流请求，由异步渠道的解析协作方调用
#[derive(Debug, Deserialize)]
pub struct ChannelIntentRequest {
    /// "voice" 或 "async"
    pub intent: String,
    /// 异步意向时，对话是否已经解决
    #[serde(default)]
    pub resolved: bool,
}

/// 提交线索并立即发起首次外呼
pub async fn submit_lead(
    State(state): State<AppState>,
    Json(request): Json<NewLead>,
) -> ApiResult<impl axum::response::IntoResponse> {
    if request.phone.trim().is_empty() {
        return Err(ApiError::BadRequest("电话号码不能为空".to_string()));
    }
    if request.name.trim().is_empty() {
        return Err(ApiError::BadRequest("姓名不能为空".to_string()));
    }

    let lead = state.intake.submit(request).await?;
    Ok(created(lead))
}

/// 查询单个线索
pub async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let lead = state
        .lead_repo
        .get_by_id(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(success(lead))
}

/// 查询线索的呼叫尝试历史
pub async fn get_lead_attempts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl axum::response::IntoResponse> {
    state
        .lead_repo
        .get_by_id(id)
        .await?
        .ok_or(ApiError::NotFound)?;

    let attempts = state.attempt_repo.get_by_lead_id(id).await?;
    Ok(success(attempts))
}

/// 回流渠道意向：对方要求电话则重新进语音流程，选择异步则
/// 维持等待或按 resolved 标记完结
pub async fn channel_intent(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ChannelIntentRequest>,
) -> ApiResult<impl axum::response::IntoResponse> {
    let intent = match request.intent.as_str() {
        "voice" => ChannelIntent::Voice,
        "async" => ChannelIntent::Async {
            resolved: request.resolved,
        },
        other => {
            return Err(ApiError::BadRequest(format!("未知渠道意向: {other}")));
        }
    };

    let lead = state.intake.handle_channel_intent(id, intent).await?;
    Ok(success(lead))
}
