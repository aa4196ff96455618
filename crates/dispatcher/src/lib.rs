pub mod call_event_service;
pub mod intake_service;
pub mod outcome;
pub mod retry_service;
pub mod sweep_runner;
pub mod sweep_service;
pub mod test_utils;

pub use call_event_service::{CallEventService, EventAck};
pub use intake_service::{ChannelIntent, LeadIntakeService, NewLead};
pub use outcome::{classify, CallOutcome};
pub use retry_service::{RandomSource, RetryDecision, RetryScheduler, ThreadRandom};
pub use sweep_runner::SweepRunner;
pub use sweep_service::{PromptSweepStats, RetrySweepStats, SweepService};
