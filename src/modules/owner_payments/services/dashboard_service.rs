use std::sync::Arc;

use crate::core::Result;
use crate::modules::allocations::models::UnifiedAllocation;
use crate::modules::allocations::services::AllocationService;
use crate::modules::balances::services::BalanceService;
use crate::modules::batches::services::BatchService;
use crate::modules::owner_payments::models::{fold_pending, OwnerBalances, OwnerPaymentDashboard};
use crate::modules::owner_payments::repositories::DashboardRepository;
use crate::modules::properties::models::PropertyFilter;

/// Open batches shown on the dashboard
const DASHBOARD_BATCH_LIMIT: i64 = 100;

pub struct OwnerPaymentService {
    dashboard: Arc<dyn DashboardRepository>,
    allocations: Arc<AllocationService>,
    batches: Arc<BatchService>,
    balances: Arc<BalanceService>,
}

impl OwnerPaymentService {
    pub fn new(
        dashboard: Arc<dyn DashboardRepository>,
        allocations: Arc<AllocationService>,
        batches: Arc<BatchService>,
        balances: Arc<BalanceService>,
    ) -> Self {
        Self {
            dashboard,
            allocations,
            batches,
            balances,
        }
    }

    pub async fn dashboard(&self) -> Result<OwnerPaymentDashboard> {
        let by_beneficiary = self.dashboard.pending_by_beneficiary().await?;
        let status_counts = self.dashboard.status_counts().await?;
        let open_batches = self.batches.list_pending(DASHBOARD_BATCH_LIMIT, 0).await?;

        Ok(OwnerPaymentDashboard {
            pending: fold_pending(&by_beneficiary),
            by_beneficiary,
            status_counts,
            open_batches,
        })
    }

    /// Pending allocations payable to the owner
    pub async fn owner_pending_allocations(&self, owner_id: i64) -> Result<Vec<UnifiedAllocation>> {
        self.allocations.pending_for_beneficiary(owner_id).await
    }

    pub async fn owner_balances(&self, owner_id: i64) -> Result<OwnerBalances> {
        let filter = PropertyFilter {
            owner_id: Some(owner_id),
            limit: i64::from(u16::MAX),
            ..PropertyFilter::default()
        };
        let properties = self.balances.list_summaries(&filter).await?;
        let total_balance = self.balances.total_balance_for_owner(owner_id).await?;
        Ok(OwnerBalances {
            owner_id,
            total_balance,
            properties,
        })
    }
}
