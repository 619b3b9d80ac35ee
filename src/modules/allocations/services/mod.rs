pub mod allocation_service;

pub use allocation_service::{AllocationService, Beneficiary, Recorded};
