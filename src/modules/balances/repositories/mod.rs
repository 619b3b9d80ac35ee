pub mod ledger_repository;

pub(crate) use ledger_repository::apply_movements_in_tx;
pub use ledger_repository::{LedgerRepository, MySqlLedgerRepository};
