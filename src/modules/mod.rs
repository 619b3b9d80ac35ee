pub mod allocations;
pub mod balances;
pub mod batches;
pub mod email_settings;
pub mod health;
pub mod leases;
pub mod owner_payments;
pub mod payprop;
pub mod properties;
pub mod transactions;
