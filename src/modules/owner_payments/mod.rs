// Owner payment dashboard and owner self-service views

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{BeneficiaryPending, OwnerPaymentDashboard};
pub use repositories::{DashboardRepository, MySqlDashboardRepository};
pub use services::OwnerPaymentService;
