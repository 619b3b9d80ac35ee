pub mod lease_service;

pub use lease_service::LeaseService;
