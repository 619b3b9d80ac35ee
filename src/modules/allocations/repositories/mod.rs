pub mod allocation_repository;

pub use allocation_repository::{AllocationRepository, MySqlAllocationRepository};
