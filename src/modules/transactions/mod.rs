// Historical bank transactions imported from CSV statements

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use models::{HistoricalTransaction, TransactionType};
pub use repositories::{HistoricalTransactionRepository, MySqlHistoricalTransactionRepository};
pub use services::TransactionImportService;
