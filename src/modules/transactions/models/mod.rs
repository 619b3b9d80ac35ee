mod historical_transaction;

pub use historical_transaction::{
    HistoricalTransaction, NewHistoricalTransaction, TransactionImportReport,
    TransactionListQuery, TransactionType, TRANSACTION_CSV_HEADER,
};
