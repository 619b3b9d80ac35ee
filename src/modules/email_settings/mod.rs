// Email templates and per-user trigger settings

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{EmailSettings, EmailTemplate, SettingsKind, Trigger, TriggerSlot};
pub use repositories::{EmailSettingsRepository, MySqlEmailSettingsRepository};
pub use services::EmailSettingsService;
