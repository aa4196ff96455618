pub mod call_attempt;
pub mod call_event;
pub mod lead;

pub use call_attempt::{CallAttempt, CallAttemptStatus};
pub use call_event::{CallEventBody, CallEventKind, CallWebhookEvent};
pub use lead::{ChannelPreference, Lead, LeadStatus};
