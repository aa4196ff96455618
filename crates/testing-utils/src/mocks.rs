//! Mock implementations for the repository and gateway traits
//!
//! In-memory stand-ins that can be used for unit testing without a real
//! database or the external voice/messaging providers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use outreach_core::errors::{OutreachError, OutreachResult};
use outreach_core::models::{CallAttempt, Lead, LeadStatus};
use outreach_core::traits::{
    CallAttemptRepository, LeadRepository, MessageGateway, VoiceDispatchGateway,
};

/// Mock implementation of LeadRepository for testing
#[derive(Debug, Clone)]
pub struct MockLeadRepository {
    leads: Arc<Mutex<HashMap<i64, Lead>>>,
    next_id: Arc<Mutex<i64>>,
}

impl Default for MockLeadRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLeadRepository {
    pub fn new() -> Self {
        Self {
            leads: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for lead in leads {
            if lead.id > max_id {
                max_id = lead.id;
            }
            map.insert(lead.id, lead);
        }
        Self {
            leads: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn count(&self) -> usize {
        self.leads.lock().unwrap().len()
    }
}

#[async_trait]
impl LeadRepository for MockLeadRepository {
    async fn create(&self, lead: &Lead) -> OutreachResult<Lead> {
        let mut leads = self.leads.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_lead = lead.clone();
        new_lead.id = *next_id;
        *next_id += 1;

        leads.insert(new_lead.id, new_lead.clone());
        Ok(new_lead)
    }

    async fn get_by_id(&self, id: i64) -> OutreachResult<Option<Lead>> {
        Ok(self.leads.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, lead: &Lead) -> OutreachResult<()> {
        let mut leads = self.leads.lock().unwrap();
        if !leads.contains_key(&lead.id) {
            return Err(OutreachError::LeadNotFound { id: lead.id });
        }
        leads.insert(lead.id, lead.clone());
        Ok(())
    }

    async fn get_due_retries(
        &self,
        now: DateTime<Utc>,
        limit: Option<i64>,
    ) -> OutreachResult<Vec<Lead>> {
        let leads = self.leads.lock().unwrap();
        let mut due: Vec<Lead> = leads
            .values()
            .filter(|l| {
                l.status == LeadStatus::RetryPending
                    && l.next_retry_at.map(|at| at <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by_key(|l| l.next_retry_at);
        if let Some(limit) = limit {
            due.truncate(limit as usize);
        }
        Ok(due)
    }

    async fn get_by_status(&self, status: LeadStatus) -> OutreachResult<Vec<Lead>> {
        let leads = self.leads.lock().unwrap();
        let mut found: Vec<Lead> = leads.values().filter(|l| l.status == status).cloned().collect();
        found.sort_by_key(|l| l.id);
        Ok(found)
    }
}

/// Mock implementation of CallAttemptRepository for testing
#[derive(Debug, Clone)]
pub struct MockCallAttemptRepository {
    attempts: Arc<Mutex<HashMap<i64, CallAttempt>>>,
    next_id: Arc<Mutex<i64>>,
}

impl Default for MockCallAttemptRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCallAttemptRepository {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    pub fn with_attempts(attempts: Vec<CallAttempt>) -> Self {
        let mut map = HashMap::new();
        let mut max_id = 0;
        for attempt in attempts {
            if attempt.id > max_id {
                max_id = attempt.id;
            }
            map.insert(attempt.id, attempt);
        }
        Self {
            attempts: Arc::new(Mutex::new(map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
        }
    }

    pub fn count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl CallAttemptRepository for MockCallAttemptRepository {
    async fn create(&self, attempt: &CallAttempt) -> OutreachResult<CallAttempt> {
        let mut attempts = self.attempts.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_attempt = attempt.clone();
        new_attempt.id = *next_id;
        *next_id += 1;

        attempts.insert(new_attempt.id, new_attempt.clone());
        Ok(new_attempt)
    }

    async fn get_by_id(&self, id: i64) -> OutreachResult<Option<CallAttempt>> {
        Ok(self.attempts.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_call_handle(&self, call_handle: &str) -> OutreachResult<Option<CallAttempt>> {
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .values()
            .find(|a| a.call_handle.as_deref() == Some(call_handle))
            .cloned())
    }

    async fn get_by_lead_id(&self, lead_id: i64) -> OutreachResult<Vec<CallAttempt>> {
        let attempts = self.attempts.lock().unwrap();
        let mut found: Vec<CallAttempt> =
            attempts.values().filter(|a| a.lead_id == lead_id).cloned().collect();
        found.sort_by_key(|a| a.attempt_no);
        Ok(found)
    }

    async fn latest_for_lead(&self, lead_id: i64) -> OutreachResult<Option<CallAttempt>> {
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts
            .values()
            .filter(|a| a.lead_id == lead_id)
            .max_by_key(|a| a.attempt_no)
            .cloned())
    }

    async fn has_in_flight(&self, lead_id: i64) -> OutreachResult<bool> {
        let attempts = self.attempts.lock().unwrap();
        Ok(attempts.values().any(|a| a.lead_id == lead_id && a.is_in_flight()))
    }

    async fn update(&self, attempt: &CallAttempt) -> OutreachResult<()> {
        let mut attempts = self.attempts.lock().unwrap();
        if !attempts.contains_key(&attempt.id) {
            return Err(OutreachError::AttemptNotFound { id: attempt.id });
        }
        attempts.insert(attempt.id, attempt.clone());
        Ok(())
    }

    async fn store_transcript(
        &self,
        id: i64,
        transcript: &serde_json::Value,
    ) -> OutreachResult<()> {
        let mut attempts = self.attempts.lock().unwrap();
        let attempt = attempts
            .get_mut(&id)
            .ok_or(OutreachError::AttemptNotFound { id })?;
        attempt.transcript = Some(transcript.clone());
        Ok(())
    }
}

/// Mock voice gateway that records dispatched calls and hands out handles
#[derive(Debug, Clone, Default)]
pub struct MockVoiceGateway {
    dispatched: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
    fail_next: Arc<Mutex<bool>>,
    handle_counter: Arc<Mutex<u64>>,
}

impl MockVoiceGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next dispatch call fail with a gateway error
    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn dispatched_calls(&self) -> Vec<(String, HashMap<String, String>)> {
        self.dispatched.lock().unwrap().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().unwrap().len()
    }
}

#[async_trait]
impl VoiceDispatchGateway for MockVoiceGateway {
    async fn dispatch(
        &self,
        phone: &str,
        variables: &HashMap<String, String>,
    ) -> OutreachResult<String> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(OutreachError::DispatchGateway(
                "simulated provider outage".to_string(),
            ));
        }

        let mut counter = self.handle_counter.lock().unwrap();
        *counter += 1;
        let handle = format!("call-{:04}", *counter);

        self.dispatched
            .lock()
            .unwrap()
            .push((phone.to_string(), variables.clone()));
        Ok(handle)
    }
}

/// Mock message gateway that records outbound texts
#[derive(Debug, Clone, Default)]
pub struct MockMessageGateway {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail_next: Arc<Mutex<bool>>,
}

impl MockMessageGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageGateway for MockMessageGateway {
    async fn send_text(&self, to: &str, body: &str) -> OutreachResult<()> {
        if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
            return Err(OutreachError::MessageGateway(
                "simulated channel outage".to_string(),
            ));
        }
        self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
        Ok(())
    }
}
