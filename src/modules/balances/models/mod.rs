mod ledger;

pub use ledger::{
    post_movements, touched_property_ids, AccountState, BalanceMovement, BalanceSummary,
    EntryType, LedgerEntry, LedgerPage, LedgerQuery, LedgerSource, NewLedgerEntry,
    UnitContribution,
};
