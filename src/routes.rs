use actix_web::web;

use crate::modules::{
    allocations, balances, batches, email_settings, health, leases, owner_payments, payprop,
    properties, transactions,
};

/// Mounts probes first, then every API scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::controllers::configure)
        .configure(batches::controllers::configure)
        .configure(allocations::controllers::configure)
        .configure(balances::controllers::configure)
        .configure(properties::controllers::configure)
        .configure(transactions::controllers::configure)
        .configure(leases::controllers::configure)
        .configure(payprop::controllers::configure)
        .configure(owner_payments::controllers::configure)
        .configure(email_settings::controllers::configure);
}
