//! # Outreach API
//!
//! 线索外呼系统的HTTP服务模块，基于Axum构建：
//! - `POST /api/leads` - 提交线索并立即发起首次外呼
//! - `GET /api/leads/{id}` - 查询线索
//! - `GET /api/leads/{id}/attempts` - 查询线索的呼叫尝试
//! - `POST /api/leads/{id}/channel-intent` - 回流渠道意向信号
//! - `POST /webhooks/calls` - 呼叫生命周期webhook（HMAC验签）
//! - `GET /health` - 健康检查

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;

use outreach_core::config::ApiConfig;
use outreach_core::traits::{CallAttemptRepository, LeadRepository};
use outreach_dispatcher::{CallEventService, LeadIntakeService};

use auth::WebhookSecret;
use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    intake: Arc<LeadIntakeService>,
    call_events: Arc<CallEventService>,
    api_config: &ApiConfig,
) -> Router {
    let state = AppState {
        lead_repo,
        attempt_repo,
        intake,
        call_events,
        webhook_secret: Arc::new(WebhookSecret::new(&api_config.webhook_secret)),
    };

    create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(cors_layer())
            .layer(axum::middleware::from_fn(request_logging)),
    )
}
