// Service graph shared by every worker

use std::sync::Arc;

use actix_web::web;
use sqlx::MySqlPool;

use crate::modules::allocations::{AllocationRepository, AllocationService, MySqlAllocationRepository};
use crate::modules::balances::{BalanceService, LedgerRepository, MySqlLedgerRepository};
use crate::modules::batches::{BatchRepository, BatchService, MySqlBatchRepository};
use crate::modules::email_settings::{
    EmailSettingsRepository, EmailSettingsService, MySqlEmailSettingsRepository,
};
use crate::modules::leases::{LeaseRepository, LeaseService, MySqlLeaseRepository};
use crate::modules::owner_payments::{
    DashboardRepository, MySqlDashboardRepository, OwnerPaymentService,
};
use crate::modules::payprop::{PayPropApi, PaymentSyncJob, SyncSupervisor};
use crate::modules::properties::{MySqlPropertyRepository, PropertyRepository, VacancyService};
use crate::modules::transactions::{
    HistoricalTransactionRepository, MySqlHistoricalTransactionRepository,
    TransactionImportService,
};

/// One handle per persistence seam
#[derive(Clone)]
pub struct Repositories {
    pub properties: Arc<dyn PropertyRepository>,
    pub ledger: Arc<dyn LedgerRepository>,
    pub allocations: Arc<dyn AllocationRepository>,
    pub transactions: Arc<dyn HistoricalTransactionRepository>,
    pub batches: Arc<dyn BatchRepository>,
    pub leases: Arc<dyn LeaseRepository>,
    pub dashboard: Arc<dyn DashboardRepository>,
    pub email_settings: Arc<dyn EmailSettingsRepository>,
}

impl Repositories {
    pub fn mysql(pool: &MySqlPool) -> Self {
        Self {
            properties: Arc::new(MySqlPropertyRepository::new(pool.clone())),
            ledger: Arc::new(MySqlLedgerRepository::new(pool.clone())),
            allocations: Arc::new(MySqlAllocationRepository::new(pool.clone())),
            transactions: Arc::new(MySqlHistoricalTransactionRepository::new(pool.clone())),
            batches: Arc::new(MySqlBatchRepository::new(pool.clone())),
            leases: Arc::new(MySqlLeaseRepository::new(pool.clone())),
            dashboard: Arc::new(MySqlDashboardRepository::new(pool.clone())),
            email_settings: Arc::new(MySqlEmailSettingsRepository::new(pool.clone())),
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub properties: Arc<VacancyService>,
    pub balances: Arc<BalanceService>,
    pub allocations: Arc<AllocationService>,
    pub transactions: Arc<TransactionImportService>,
    pub batches: Arc<BatchService>,
    pub leases: Arc<LeaseService>,
    pub owner_payments: Arc<OwnerPaymentService>,
    pub email_settings: Arc<EmailSettingsService>,
    pub sync: Arc<SyncSupervisor>,
}

impl AppServices {
    /// `payprop` is `None` when no PayProp access token is configured
    pub fn build(repos: Repositories, payprop: Option<Arc<dyn PayPropApi>>) -> Self {
        let properties = Arc::new(VacancyService::new(repos.properties.clone()));
        let balances = Arc::new(BalanceService::new(
            repos.ledger.clone(),
            repos.properties.clone(),
        ));
        let allocations = Arc::new(AllocationService::new(
            repos.allocations.clone(),
            repos.properties.clone(),
            repos.transactions.clone(),
        ));
        let transactions = Arc::new(TransactionImportService::new(
            repos.transactions.clone(),
            repos.properties.clone(),
        ));
        let batches = Arc::new(BatchService::new(
            repos.batches.clone(),
            repos.allocations.clone(),
            repos.properties.clone(),
        ));
        let leases = Arc::new(LeaseService::new(
            repos.leases.clone(),
            repos.properties.clone(),
        ));
        let owner_payments = Arc::new(OwnerPaymentService::new(
            repos.dashboard.clone(),
            allocations.clone(),
            batches.clone(),
            balances.clone(),
        ));
        let email_settings = Arc::new(EmailSettingsService::new(repos.email_settings.clone()));

        let payment_sync = payprop.map(|api| {
            Arc::new(PaymentSyncJob::new(
                api,
                allocations.clone(),
                repos.properties.clone(),
            ))
        });
        let sync = Arc::new(SyncSupervisor::new(payment_sync));

        Self {
            properties,
            balances,
            allocations,
            transactions,
            batches,
            leases,
            owner_payments,
            email_settings,
            sync,
        }
    }

    /// Registers each service as app data for its controllers
    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.properties.clone()))
            .app_data(web::Data::new(self.balances.clone()))
            .app_data(web::Data::new(self.allocations.clone()))
            .app_data(web::Data::new(self.transactions.clone()))
            .app_data(web::Data::new(self.batches.clone()))
            .app_data(web::Data::new(self.leases.clone()))
            .app_data(web::Data::new(self.owner_payments.clone()))
            .app_data(web::Data::new(self.email_settings.clone()))
            .app_data(web::Data::new(self.sync.clone()));
    }
}
