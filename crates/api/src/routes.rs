use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use outreach_core::traits::{CallAttemptRepository, LeadRepository};
use outreach_dispatcher::{CallEventService, LeadIntakeService};

use crate::auth::WebhookSecret;
use crate::handlers::{
    health::health_check,
    leads::{channel_intent, get_lead, get_lead_attempts, submit_lead},
    webhooks::receive_call_event,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub lead_repo: Arc<dyn LeadRepository>,
    pub attempt_repo: Arc<dyn CallAttemptRepository>,
    pub intake: Arc<LeadIntakeService>,
    pub call_events: Arc<CallEventService>,
    pub webhook_secret: Arc<WebhookSecret>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 线索接入与查询
        .route("/api/leads", post(submit_lead))
        .route("/api/leads/{id}", get(get_lead))
        .route("/api/leads/{id}/attempts", get(get_lead_attempts))
        .route("/api/leads/{id}/channel-intent", post(channel_intent))
        // 呼叫生命周期webhook
        .route("/webhooks/calls", post(receive_call_event))
        .with_state(state)
}
