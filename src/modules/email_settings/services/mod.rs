pub mod email_settings_service;

pub use email_settings_service::EmailSettingsService;
