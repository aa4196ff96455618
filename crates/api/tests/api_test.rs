use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use outreach_api::auth::{WebhookSecret, SIGNATURE_HEADER};
use outreach_api::create_app;
use outreach_core::config::{ApiConfig, RetryPolicyConfig};
use outreach_core::models::LeadStatus;
use outreach_core::traits::{CallAttemptRepository, LeadRepository};
use outreach_dispatcher::{CallEventService, LeadIntakeService, RetryScheduler, ThreadRandom};
use outreach_testing_utils::{
    CallAttemptBuilder, LeadBuilder, MockCallAttemptRepository, MockLeadRepository,
    MockVoiceGateway,
};

struct TestApp {
    app: Router,
    lead_repo: Arc<MockLeadRepository>,
    attempt_repo: Arc<MockCallAttemptRepository>,
    voice_gateway: Arc<MockVoiceGateway>,
    secret: WebhookSecret,
}

fn test_app() -> TestApp {
    let lead_repo = Arc::new(MockLeadRepository::new());
    let attempt_repo = Arc::new(MockCallAttemptRepository::new());
    let voice_gateway = Arc::new(MockVoiceGateway::new());

    let intake = Arc::new(LeadIntakeService::new(
        lead_repo.clone(),
        attempt_repo.clone(),
        voice_gateway.clone(),
    ));
    let scheduler = Arc::new(RetryScheduler::new(
        RetryPolicyConfig::default(),
        Arc::new(ThreadRandom),
    ));
    let call_events = Arc::new(CallEventService::new(
        lead_repo.clone(),
        attempt_repo.clone(),
        scheduler,
    ));

    let api_config = ApiConfig {
        enabled: true,
        bind_address: "127.0.0.1:0".to_string(),
        cors_enabled: true,
        cors_origins: vec!["*".to_string()],
        webhook_secret: "test-secret".to_string(),
    };

    let app = create_app(
        lead_repo.clone(),
        attempt_repo.clone(),
        intake,
        call_events,
        &api_config,
    );

    TestApp {
        app,
        lead_repo,
        attempt_repo,
        voice_gateway,
        secret: WebhookSecret::new("test-secret"),
    }
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn signed_webhook(secret: &WebhookSecret, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/calls")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, secret.sign(body.as_bytes()))
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let t = test_app();
    let response = t
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_lead_creates_and_dispatches() {
    let t = test_app();
    let body = r#"{"name":"Lucía Fernández","phone":"+5215512345678","city":"Guadalajara"}"#;

    let response = t
        .app
        .clone()
        .oneshot(json_request("POST", "/api/leads", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    assert_eq!(t.lead_repo.count(), 1);
    assert_eq!(t.voice_gateway.dispatch_count(), 1);

    let lead = t.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::InProgress);

    let response = t
        .app
        .oneshot(Request::builder().uri("/api/leads/1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_lead_without_phone_is_rejected() {
    let t = test_app();
    let body = r#"{"name":"Lucía Fernández","phone":"  "}"#;

    let response = t
        .app
        .oneshot(json_request("POST", "/api/leads", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(t.lead_repo.count(), 0);
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let t = test_app();
    let body = r#"{"event":"call_ended","call":{"id":"call-0001"}}"#;

    let response = t
        .app
        .oneshot(json_request("POST", "/webhooks/calls", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_with_wrong_signature_is_rejected() {
    let t = test_app();
    let body = r#"{"event":"call_ended","call":{"id":"call-0001"}}"#;
    let wrong = WebhookSecret::new("other-secret");

    let response = t
        .app
        .oneshot(signed_webhook(&wrong, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// Scenario: a webhook whose call handle matches no attempt responds
// success and writes nothing.
#[tokio::test]
async fn webhook_unknown_handle_is_acked_without_writes() {
    let t = test_app();
    let body = r#"{"event":"call_ended","call":{"id":"call-nope","summary":"no answer"}}"#;

    let response = t
        .app
        .oneshot(signed_webhook(&t.secret, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.lead_repo.count(), 0);
    assert_eq!(t.attempt_repo.count(), 0);
}

#[tokio::test]
async fn webhook_call_ended_drives_lead_transition() {
    let t = test_app();
    t.lead_repo
        .create(&LeadBuilder::new().with_id(0).with_status(LeadStatus::InProgress).build())
        .await
        .unwrap();
    t.attempt_repo
        .create(
            &CallAttemptBuilder::new()
                .with_id(0)
                .with_lead_id(1)
                .with_attempt_no(1)
                .with_call_handle("call-0001")
                .build(),
        )
        .await
        .unwrap();

    let body = r#"{"event":"call_ended","call":{"id":"call-0001","summary":"no contestó"}}"#;
    let response = t
        .app
        .oneshot(signed_webhook(&t.secret, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let lead = t.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::RetryPending);
    assert!(lead.next_retry_at.is_some());
}

#[tokio::test]
async fn webhook_malformed_payload_with_valid_signature_is_bad_request() {
    let t = test_app();
    let body = "not-json-at-all";

    let response = t
        .app
        .oneshot(signed_webhook(&t.secret, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn channel_intent_voice_redials_lead() {
    let t = test_app();
    t.lead_repo
        .create(
            &LeadBuilder::new()
                .with_id(0)
                .with_status(LeadStatus::AwaitingChannelChoice)
                .build(),
        )
        .await
        .unwrap();

    let response = t
        .app
        .oneshot(json_request(
            "POST",
            "/api/leads/1/channel-intent",
            r#"{"intent":"voice"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.voice_gateway.dispatch_count(), 1);

    let lead = t.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::InProgress);
}

#[tokio::test]
async fn channel_intent_unknown_value_is_rejected() {
    let t = test_app();
    t.lead_repo
        .create(
            &LeadBuilder::new()
                .with_id(0)
                .with_status(LeadStatus::AwaitingChannelChoice)
                .build(),
        )
        .await
        .unwrap();

    let response = t
        .app
        .oneshot(json_request(
            "POST",
            "/api/leads/1/channel-intent",
            r#"{"intent":"carrier-pigeon"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_lead_returns_not_found() {
    let t = test_app();
    let response = t
        .app
        .oneshot(Request::builder().uri("/api/leads/99").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lead_attempts_are_listed() {
    let t = test_app();
    t.lead_repo
        .create(&LeadBuilder::new().with_id(0).with_status(LeadStatus::InProgress).build())
        .await
        .unwrap();
    t.attempt_repo
        .create(
            &CallAttemptBuilder::new()
                .with_id(0)
                .with_lead_id(1)
                .with_attempt_no(1)
                .build(),
        )
        .await
        .unwrap();

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri("/api/leads/1/attempts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
