use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use outreach_core::models::CallWebhookEvent;

use crate::auth::SIGNATURE_HEADER;
use crate::response::success;
use crate::routes::AppState;

/// 呼叫生命周期webhook入口
///
/// 先对原始请求体验签，失败统一回泛化的401，不做任何后续处理。
/// 验签通过后的内部错误尽量仍以成功应答收尾并记日志，失败的确认
/// 会让上游无限重投。
pub async fn receive_call_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = state.webhook_secret.verify(signature, &body) {
        warn!("webhook 验签失败: {}", e);
        return (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({"error": "unauthorized"})),
        )
            .into_response();
    }

    let event: CallWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("webhook 载荷解析失败: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({"error": "malformed payload"})),
            )
                .into_response();
        }
    };

    match state.call_events.handle_event(&event).await {
        Ok(ack) => success(json!({"ack": format!("{ack:?}")})).into_response(),
        Err(e) => {
            error!("处理呼叫事件失败: {}", e);
            success(json!({"ack": "Error", "logged": true})).into_response()
        }
    }
}
