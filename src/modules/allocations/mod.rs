// Unified allocations: what each transaction owes to which beneficiary

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{AllocationType, PaymentStatus, UnifiedAllocation};
pub use repositories::{AllocationRepository, MySqlAllocationRepository};
pub use services::AllocationService;
