//! PropLedger property management core
//!
//! Owner payment batches, the property balance ledger, unified allocations,
//! historical transaction imports, leases, PayProp sync and email trigger settings.

pub mod config;
pub mod core;
pub mod middleware;
pub mod modules;
pub mod routes;
pub mod state;

pub use core::{AppError, Result};
pub use state::{AppServices, Repositories};
