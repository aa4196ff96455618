pub mod database;
pub mod gateways;

pub use database::sqlite::{SqliteCallAttemptRepository, SqliteLeadRepository};
pub use gateways::{HttpMessageGateway, HttpVoiceGateway};
