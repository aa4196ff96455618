pub mod sqlite_call_attempt_repository;
pub mod sqlite_lead_repository;

pub use sqlite_call_attempt_repository::SqliteCallAttemptRepository;
pub use sqlite_lead_repository::SqliteLeadRepository;
