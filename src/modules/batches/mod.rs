// Payment batches: grouping allocations into payments, adjustments and lifecycle

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{BatchStatus, BatchType, PaymentBatch};
pub use repositories::{BatchRepository, MySqlBatchRepository};
pub use services::BatchService;
