use std::sync::Arc;

use chrono::{Duration, Utc};

use outreach_core::config::{AppConfig, RetryPolicyConfig, SweepConfig};
use outreach_core::models::{CallAttemptStatus, ChannelPreference, LeadStatus};
use outreach_core::traits::{CallAttemptRepository, LeadRepository};
use outreach_dispatcher::{LeadIntakeService, SweepService};
use outreach_testing_utils::{
    CallAttemptBuilder, LeadBuilder, MockCallAttemptRepository, MockLeadRepository,
    MockMessageGateway, MockVoiceGateway,
};

struct SweepFixture {
    lead_repo: Arc<MockLeadRepository>,
    attempt_repo: Arc<MockCallAttemptRepository>,
    voice_gateway: Arc<MockVoiceGateway>,
    message_gateway: Arc<MockMessageGateway>,
    sweep: SweepService,
}

fn fixture(leads: Vec<outreach_core::models::Lead>, attempts: Vec<outreach_core::models::CallAttempt>) -> SweepFixture {
    let lead_repo = Arc::new(MockLeadRepository::with_leads(leads));
    let attempt_repo = Arc::new(MockCallAttemptRepository::with_attempts(attempts));
    let voice_gateway = Arc::new(MockVoiceGateway::new());
    let message_gateway = Arc::new(MockMessageGateway::new());

    let intake = Arc::new(LeadIntakeService::new(
        lead_repo.clone(),
        attempt_repo.clone(),
        voice_gateway.clone(),
    ));

    let sweep = SweepService::new(
        lead_repo.clone(),
        attempt_repo.clone(),
        message_gateway.clone(),
        intake,
        SweepConfig {
            enabled: true,
            retry_interval_seconds: 600,
            prompt_interval_seconds: 3600,
            batch_limit: 100,
        },
        RetryPolicyConfig::default(),
        AppConfig::default().messaging.channel_prompt,
    );

    SweepFixture {
        lead_repo,
        attempt_repo,
        voice_gateway,
        message_gateway,
        sweep,
    }
}

// Scenario: voicemail set next_retry_at ~20 minutes out, the timer
// elapsed, the sweep dispatches attempt 2 and the lead goes in-progress.
#[tokio::test]
async fn due_retry_is_dispatched_as_next_attempt() {
    let now = Utc::now();
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .retry_pending(now - Duration::minutes(1))
            .build()],
        vec![CallAttemptBuilder::new()
            .with_id(1)
            .with_lead_id(1)
            .with_attempt_no(1)
            .started_at(now - Duration::minutes(22))
            .with_status(CallAttemptStatus::Ended)
            .build()],
    );
    // close out attempt 1 the way the webhook would have
    {
        let mut a = f.attempt_repo.get_by_id(1).await.unwrap().unwrap();
        a.ended_at = Some(now - Duration::minutes(21));
        f.attempt_repo.update(&a).await.unwrap();
    }

    let stats = f.sweep.run_retry_pass().await.unwrap();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.failed, 0);

    let lead = f.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::InProgress);
    assert_eq!(lead.next_retry_at, None);

    let latest = f.attempt_repo.latest_for_lead(1).await.unwrap().unwrap();
    assert_eq!(latest.attempt_no, 2);
    assert_eq!(latest.status, CallAttemptStatus::Dispatched);
    assert!(latest.call_handle.is_some());
    assert_eq!(f.voice_gateway.dispatch_count(), 1);
}

#[tokio::test]
async fn lead_not_yet_due_is_left_alone() {
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .retry_pending(Utc::now() + Duration::minutes(30))
            .build()],
        vec![],
    );

    let stats = f.sweep.run_retry_pass().await.unwrap();
    assert_eq!(stats.dispatched, 0);
    assert_eq!(f.voice_gateway.dispatch_count(), 0);

    let lead = f.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::RetryPending);
}

// An attempt that was dispatched but never ended blocks re-dialing.
#[tokio::test]
async fn in_flight_attempt_prevents_double_dispatch() {
    let now = Utc::now();
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .retry_pending(now - Duration::minutes(5))
            .build()],
        vec![CallAttemptBuilder::new()
            .with_id(1)
            .with_lead_id(1)
            .with_attempt_no(1)
            .with_status(CallAttemptStatus::Dispatched)
            .build()],
    );

    let stats = f.sweep.run_retry_pass().await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(stats.dispatched, 0);
    assert_eq!(f.voice_gateway.dispatch_count(), 0);
}

// A due timestamp that predates the last attempt's start is a stale
// timer; within the minimum gap the sweep must not re-dial.
#[tokio::test]
async fn stale_timer_within_min_gap_is_deferred() {
    let now = Utc::now();
    let last_start = now - Duration::minutes(30);
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .retry_pending(last_start - Duration::minutes(10))
            .build()],
        vec![CallAttemptBuilder::new()
            .with_id(1)
            .with_lead_id(1)
            .with_attempt_no(1)
            .started_at(last_start)
            .ended()
            .build()],
    );

    let stats = f.sweep.run_retry_pass().await.unwrap();
    assert_eq!(stats.skipped, 1);
    assert_eq!(f.voice_gateway.dispatch_count(), 0);
}

// The same stale timer outside the minimum gap is allowed through.
#[tokio::test]
async fn stale_timer_outside_min_gap_dispatches() {
    let now = Utc::now();
    let last_start = now - Duration::hours(3);
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .retry_pending(last_start - Duration::minutes(10))
            .build()],
        vec![CallAttemptBuilder::new()
            .with_id(1)
            .with_lead_id(1)
            .with_attempt_no(1)
            .started_at(last_start)
            .ended()
            .build()],
    );

    let stats = f.sweep.run_retry_pass().await.unwrap();
    assert_eq!(stats.dispatched, 1);
    assert_eq!(f.voice_gateway.dispatch_count(), 1);
}

// Attempt count may never exceed max_attempts: a due lead whose next
// attempt number would pass the cap escalates instead of dialing.
#[tokio::test]
async fn exhausted_lead_escalates_instead_of_dialing() {
    let now = Utc::now();
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .with_max_attempts(3)
            .retry_pending(now - Duration::minutes(5))
            .build()],
        vec![
            CallAttemptBuilder::new().with_id(1).with_lead_id(1).with_attempt_no(1)
                .started_at(now - Duration::hours(30)).ended().build(),
            CallAttemptBuilder::new().with_id(2).with_lead_id(1).with_attempt_no(2)
                .started_at(now - Duration::hours(20)).ended().build(),
            CallAttemptBuilder::new().with_id(3).with_lead_id(1).with_attempt_no(3)
                .started_at(now - Duration::hours(10)).ended().build(),
        ],
    );

    let stats = f.sweep.run_retry_pass().await.unwrap();
    assert_eq!(stats.escalated, 1);
    assert_eq!(stats.dispatched, 0);
    assert_eq!(f.voice_gateway.dispatch_count(), 0);

    let lead = f.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::AsyncOutreach);
    assert_eq!(lead.next_retry_at, None);
    assert_eq!(lead.channel_preference, ChannelPreference::AsyncMessage);
    assert_eq!(f.attempt_repo.get_by_lead_id(1).await.unwrap().len(), 3);
}

#[tokio::test]
async fn gateway_failure_reverts_lead_and_continues_batch() {
    let now = Utc::now();
    let f = fixture(
        vec![
            LeadBuilder::new()
                .with_id(1)
                .with_phone("+5215511111111")
                .retry_pending(now - Duration::minutes(10))
                .build(),
            LeadBuilder::new()
                .with_id(2)
                .with_phone("+5215522222222")
                .retry_pending(now - Duration::minutes(5))
                .build(),
        ],
        vec![],
    );

    // first due lead hits a provider outage, second must still be dialed
    f.voice_gateway.fail_next();

    let stats = f.sweep.run_retry_pass().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.dispatched, 1);

    let lead1 = f.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead1.status, LeadStatus::DispatchFailed);
    let failed_attempt = f.attempt_repo.latest_for_lead(1).await.unwrap().unwrap();
    assert_eq!(failed_attempt.status, CallAttemptStatus::Failed);

    let lead2 = f.lead_repo.get_by_id(2).await.unwrap().unwrap();
    assert_eq!(lead2.status, LeadStatus::InProgress);
}

#[tokio::test]
async fn prompt_pass_sends_channel_question_and_advances() {
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .with_name("Carlos Mejía")
            .with_messaging_handle("+5215512345678")
            .with_status(LeadStatus::AsyncOutreach)
            .build()],
        vec![],
    );

    let stats = f.sweep.run_prompt_pass().await.unwrap();
    assert_eq!(stats.prompted, 1);
    assert_eq!(stats.failed, 0);

    let sent = f.message_gateway.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+5215512345678");
    assert!(sent[0].1.contains("Carlos Mejía"));

    let lead = f.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::AwaitingChannelChoice);
}

#[tokio::test]
async fn prompt_failure_keeps_lead_for_next_pass() {
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .with_status(LeadStatus::AsyncOutreach)
            .build()],
        vec![],
    );
    f.message_gateway.fail_next();

    let stats = f.sweep.run_prompt_pass().await.unwrap();
    assert_eq!(stats.prompted, 0);
    assert_eq!(stats.failed, 1);

    let lead = f.lead_repo.get_by_id(1).await.unwrap().unwrap();
    assert_eq!(lead.status, LeadStatus::AsyncOutreach);
}

#[tokio::test]
async fn prompt_falls_back_to_phone_without_handle() {
    let f = fixture(
        vec![LeadBuilder::new()
            .with_id(1)
            .with_phone("+5215599999999")
            .with_status(LeadStatus::AsyncOutreach)
            .build()],
        vec![],
    );

    f.sweep.run_prompt_pass().await.unwrap();
    let sent = f.message_gateway.sent_messages();
    assert_eq!(sent[0].0, "+5215599999999");
}
