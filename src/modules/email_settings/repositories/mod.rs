pub mod email_settings_repository;

pub use email_settings_repository::{EmailSettingsRepository, MySqlEmailSettingsRepository};
