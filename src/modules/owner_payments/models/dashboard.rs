use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::modules::allocations::models::{PaymentStatus, PendingTotals};
use crate::modules::balances::models::BalanceSummary;
use crate::modules::batches::models::PaymentBatch;

/// Pending allocations grouped by who they are owed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeneficiaryPending {
    pub beneficiary_id: Option<i64>,
    pub beneficiary_name: Option<String>,
    pub income: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
    pub allocation_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: PaymentStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerPaymentDashboard {
    pub pending: PendingTotals,
    pub by_beneficiary: Vec<BeneficiaryPending>,
    pub status_counts: Vec<StatusCount>,
    pub open_batches: Vec<PaymentBatch>,
}

/// Overall pending totals, folded from the per-beneficiary rows
pub fn fold_pending(rows: &[BeneficiaryPending]) -> PendingTotals {
    let mut totals = rows.iter().fold(PendingTotals::default(), |mut acc, row| {
        acc.income += row.income;
        acc.deductions += row.deductions;
        acc.count += row.allocation_count;
        acc
    });
    totals.net = totals.income - totals.deductions;
    totals
}

/// What an owner sees of their own properties
#[derive(Debug, Clone, Serialize)]
pub struct OwnerBalances {
    pub owner_id: i64,
    pub total_balance: Decimal,
    pub properties: Vec<BalanceSummary>,
}
