// Property balance ledger: deposits, withdrawals, transfers and adjustments

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{BalanceMovement, EntryType, LedgerEntry, LedgerSource};
pub use repositories::{LedgerRepository, MySqlLedgerRepository};
pub use services::BalanceService;
