pub mod historical_transaction_repository;

pub use historical_transaction_repository::{
    HistoricalTransactionRepository, MySqlHistoricalTransactionRepository,
};
