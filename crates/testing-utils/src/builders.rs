//! Test data builders for creating test entities
//!
//! Builder patterns with sensible defaults and easy customization.

use chrono::{DateTime, Utc};

use outreach_core::models::{
    CallAttempt, CallAttemptStatus, ChannelPreference, Lead, LeadStatus,
};

/// Builder for creating test Lead entities
pub struct LeadBuilder {
    lead: Lead,
}

impl LeadBuilder {
    pub fn new() -> Self {
        Self {
            lead: Lead {
                id: 1,
                name: "Ana Torres".to_string(),
                phone: "+5215512345678".to_string(),
                messaging_handle: None,
                city: Some("Monterrey".to_string()),
                specialty: Some("dermatología".to_string()),
                reason: None,
                channel_preference: ChannelPreference::Voice,
                utc_offset_minutes: Some(-300),
                status: LeadStatus::New,
                next_retry_at: None,
                max_attempts: 3,
                appointment_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.lead.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.lead.name = name.to_string();
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.lead.phone = phone.to_string();
        self
    }

    pub fn with_messaging_handle(mut self, handle: &str) -> Self {
        self.lead.messaging_handle = Some(handle.to_string());
        self
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.lead.status = status;
        self
    }

    pub fn with_next_retry_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.next_retry_at = Some(at);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.lead.max_attempts = max_attempts;
        self
    }

    pub fn with_utc_offset_minutes(mut self, offset: i32) -> Self {
        self.lead.utc_offset_minutes = Some(offset);
        self
    }

    pub fn without_utc_offset(mut self) -> Self {
        self.lead.utc_offset_minutes = None;
        self
    }

    pub fn with_appointment_at(mut self, at: DateTime<Utc>) -> Self {
        self.lead.appointment_at = Some(at);
        self
    }

    pub fn retry_pending(mut self, at: DateTime<Utc>) -> Self {
        self.lead.status = LeadStatus::RetryPending;
        self.lead.next_retry_at = Some(at);
        self
    }

    pub fn build(self) -> Lead {
        self.lead
    }
}

impl Default for LeadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test CallAttempt entities
pub struct CallAttemptBuilder {
    attempt: CallAttempt,
}

impl CallAttemptBuilder {
    pub fn new() -> Self {
        Self {
            attempt: CallAttempt {
                id: 1,
                lead_id: 1,
                attempt_no: 1,
                call_handle: Some("call-0001".to_string()),
                status: CallAttemptStatus::Dispatched,
                scheduled_at: Utc::now(),
                started_at: None,
                ended_at: None,
                raw_outcome: None,
                transcript: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.attempt.id = id;
        self
    }

    pub fn with_lead_id(mut self, lead_id: i64) -> Self {
        self.attempt.lead_id = lead_id;
        self
    }

    pub fn with_attempt_no(mut self, attempt_no: i32) -> Self {
        self.attempt.attempt_no = attempt_no;
        self
    }

    pub fn with_call_handle(mut self, handle: &str) -> Self {
        self.attempt.call_handle = Some(handle.to_string());
        self
    }

    pub fn with_status(mut self, status: CallAttemptStatus) -> Self {
        self.attempt.status = status;
        self
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.attempt.started_at = Some(at);
        self
    }

    /// Finished attempt: ended with timestamps stamped
    pub fn ended(mut self) -> Self {
        let now = Utc::now();
        self.attempt.status = CallAttemptStatus::Ended;
        if self.attempt.started_at.is_none() {
            self.attempt.started_at = Some(now - chrono::Duration::minutes(2));
        }
        self.attempt.ended_at = Some(now);
        self
    }

    pub fn failed(mut self) -> Self {
        self.attempt.status = CallAttemptStatus::Failed;
        self.attempt.ended_at = Some(Utc::now());
        self
    }

    pub fn build(self) -> CallAttempt {
        self.attempt
    }
}

impl Default for CallAttemptBuilder {
    fn default() -> Self {
        Self::new()
    }
}
