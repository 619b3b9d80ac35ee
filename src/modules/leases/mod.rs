// Leases: billing schedules per property, created directly or from CSV

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{Lease, LeaseFrequency, SyncStatus};
pub use repositories::{LeaseRepository, MySqlLeaseRepository};
pub use services::LeaseService;
