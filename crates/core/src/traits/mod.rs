pub mod gateway;
pub mod repository;

pub use gateway::{MessageGateway, VoiceDispatchGateway};
pub use repository::{CallAttemptRepository, LeadRepository};
