// PayProp agency API: paginated export client and supervised sync jobs

pub mod controllers;
pub mod models;
pub mod services;

pub use models::{JobState, JobStatus, SyncKind, SyncSummary};
pub use services::{PayPropApi, PayPropClient, PaymentSyncJob, SyncSupervisor};
