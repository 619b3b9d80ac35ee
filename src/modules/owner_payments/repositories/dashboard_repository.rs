use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::owner_payments::models::{BeneficiaryPending, StatusCount};

/// Aggregate queries behind the owner payment dashboard
#[async_trait]
pub trait DashboardRepository: Send + Sync {
    async fn pending_by_beneficiary(&self) -> Result<Vec<BeneficiaryPending>>;

    async fn status_counts(&self) -> Result<Vec<StatusCount>>;
}

#[derive(Debug, FromRow)]
struct BeneficiaryPendingRow {
    beneficiary_id: Option<i64>,
    beneficiary_name: Option<String>,
    income: Decimal,
    deductions: Decimal,
    allocation_count: i64,
}

#[derive(Debug, FromRow)]
struct StatusCountRow {
    payment_status: String,
    count: i64,
}

pub struct MySqlDashboardRepository {
    pool: MySqlPool,
}

impl MySqlDashboardRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DashboardRepository for MySqlDashboardRepository {
    async fn pending_by_beneficiary(&self) -> Result<Vec<BeneficiaryPending>> {
        let rows = sqlx::query_as::<_, BeneficiaryPendingRow>(
            r#"
            SELECT
                beneficiary_id,
                MAX(beneficiary_name) AS beneficiary_name,
                COALESCE(SUM(CASE WHEN allocation_type = 'OWNER' THEN amount ELSE 0 END), 0) AS income,
                COALESCE(SUM(CASE WHEN allocation_type <> 'OWNER' THEN amount ELSE 0 END), 0) AS deductions,
                COUNT(*) AS allocation_count
            FROM unified_allocations
            WHERE payment_status = 'PENDING'
            GROUP BY beneficiary_id
            ORDER BY beneficiary_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BeneficiaryPending {
                beneficiary_id: row.beneficiary_id,
                beneficiary_name: row.beneficiary_name,
                net: row.income - row.deductions,
                income: row.income,
                deductions: row.deductions,
                allocation_count: row.allocation_count,
            })
            .collect())
    }

    async fn status_counts(&self) -> Result<Vec<StatusCount>> {
        let rows = sqlx::query_as::<_, StatusCountRow>(
            r#"
            SELECT payment_status, COUNT(*) AS count
            FROM unified_allocations
            GROUP BY payment_status
            ORDER BY payment_status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StatusCount {
                    status: row.payment_status.parse().map_err(AppError::Internal)?,
                    count: row.count,
                })
            })
            .collect()
    }
}
