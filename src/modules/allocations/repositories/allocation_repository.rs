use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use crate::core::{AppError, Result};
use crate::modules::allocations::models::{
    AllocationFilter, NewAllocation, PaymentStatus, PendingTotals, TransactionKey, UnifiedAllocation,
};

/// Allocation persistence
#[async_trait]
pub trait AllocationRepository: Send + Sync {
    /// Inserts with the given initial status. A duplicate (transaction, beneficiary)
    /// pair surfaces as a unique violation.
    async fn insert(&self, new: &NewAllocation, status: PaymentStatus)
        -> Result<UnifiedAllocation>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UnifiedAllocation>>;

    /// Missing ids are silently absent from the result
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<UnifiedAllocation>>;

    async fn find_by_transaction(
        &self,
        key: &TransactionKey,
        beneficiary_id: Option<i64>,
    ) -> Result<Option<UnifiedAllocation>>;

    async fn list(&self, filter: &AllocationFilter) -> Result<Vec<UnifiedAllocation>>;

    /// Owner income against every other type, over all rows matching `filter`.
    /// Paging fields are ignored.
    async fn totals(&self, filter: &AllocationFilter) -> Result<PendingTotals>;
}

const ALLOCATION_COLUMNS: &str = r#"
    id, transaction_id, payprop_payment_id, allocation_type, amount, category,
    description, property_id, property_name, beneficiary_id, beneficiary_name,
    payment_status, payment_batch_id, paid_date, source, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct TotalsRow {
    income: Decimal,
    deductions: Decimal,
    count: i64,
}

#[derive(Debug, FromRow)]
struct AllocationRow {
    id: i64,
    transaction_id: Option<i64>,
    payprop_payment_id: Option<String>,
    allocation_type: String,
    amount: Decimal,
    category: Option<String>,
    description: Option<String>,
    property_id: Option<i64>,
    property_name: Option<String>,
    beneficiary_id: Option<i64>,
    beneficiary_name: Option<String>,
    payment_status: String,
    payment_batch_id: Option<String>,
    paid_date: Option<NaiveDate>,
    source: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AllocationRow> for UnifiedAllocation {
    type Error = AppError;

    fn try_from(row: AllocationRow) -> Result<Self> {
        Ok(UnifiedAllocation {
            id: row.id,
            transaction_id: row.transaction_id,
            payprop_payment_id: row.payprop_payment_id,
            allocation_type: row.allocation_type.parse().map_err(AppError::Internal)?,
            amount: row.amount,
            category: row.category,
            description: row.description,
            property_id: row.property_id,
            property_name: row.property_name,
            beneficiary_id: row.beneficiary_id,
            beneficiary_name: row.beneficiary_name,
            payment_status: row.payment_status.parse().map_err(AppError::Internal)?,
            payment_batch_id: row.payment_batch_id,
            paid_date: row.paid_date,
            source: row.source.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct MySqlAllocationRepository {
    pool: MySqlPool,
}

impl MySqlAllocationRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by_id(&self, id: i64) -> Result<Option<UnifiedAllocation>> {
        let sql = format!(
            "SELECT {} FROM unified_allocations WHERE id = ?",
            ALLOCATION_COLUMNS
        );
        let row = sqlx::query_as::<_, AllocationRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UnifiedAllocation::try_from).transpose()
    }
}

#[async_trait]
impl AllocationRepository for MySqlAllocationRepository {
    async fn insert(
        &self,
        new: &NewAllocation,
        status: PaymentStatus,
    ) -> Result<UnifiedAllocation> {
        let (transaction_id, payprop_payment_id) = match &new.transaction {
            Some(TransactionKey::Historical(id)) => (Some(*id), None),
            Some(TransactionKey::PayProp(payment_id)) => (None, Some(payment_id.clone())),
            None => (None, None),
        };
        let (batch_reference, paid_date) = match &new.settled {
            Some(s) => (Some(s.batch_reference.clone()), Some(s.paid_date)),
            None => (None, None),
        };
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO unified_allocations (
                transaction_id, payprop_payment_id, allocation_type, amount, category,
                description, property_id, property_name, beneficiary_id, beneficiary_name,
                payment_status, payment_batch_id, paid_date, source, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(transaction_id)
        .bind(payprop_payment_id)
        .bind(new.allocation_type.as_str())
        .bind(new.amount)
        .bind(&new.category)
        .bind(&new.description)
        .bind(new.property_id)
        .bind(&new.property_name)
        .bind(new.beneficiary_id)
        .bind(&new.beneficiary_name)
        .bind(status.as_str())
        .bind(batch_reference)
        .bind(paid_date)
        .bind(new.source.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, "Allocation already recorded for this beneficiary"))?;

        let id = result.last_insert_id() as i64;
        self.fetch_one_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Allocation {} vanished after insert", id)))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UnifiedAllocation>> {
        self.fetch_one_by_id(id).await
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<UnifiedAllocation>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM unified_allocations WHERE id IN (",
            ALLOCATION_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = qb
            .build_query_as::<AllocationRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(UnifiedAllocation::try_from).collect()
    }

    async fn find_by_transaction(
        &self,
        key: &TransactionKey,
        beneficiary_id: Option<i64>,
    ) -> Result<Option<UnifiedAllocation>> {
        let column = match key {
            TransactionKey::Historical(_) => "transaction_id",
            TransactionKey::PayProp(_) => "payprop_payment_id",
        };
        let sql = format!(
            "SELECT {} FROM unified_allocations WHERE {} = ? AND beneficiary_id <=> ? LIMIT 1",
            ALLOCATION_COLUMNS, column
        );

        let query = sqlx::query_as::<_, AllocationRow>(&sql);
        let query = match key {
            TransactionKey::Historical(id) => query.bind(*id),
            TransactionKey::PayProp(payment_id) => query.bind(payment_id.clone()),
        };
        let row = query
            .bind(beneficiary_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(UnifiedAllocation::try_from).transpose()
    }

    async fn list(&self, filter: &AllocationFilter) -> Result<Vec<UnifiedAllocation>> {
        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM unified_allocations WHERE 1 = 1",
            ALLOCATION_COLUMNS
        ));

        push_filter(&mut qb, filter);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = qb
            .build_query_as::<AllocationRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(UnifiedAllocation::try_from).collect()
    }

    async fn totals(&self, filter: &AllocationFilter) -> Result<PendingTotals> {
        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN allocation_type = 'OWNER' THEN amount ELSE 0 END), 0) AS income,
                COALESCE(SUM(CASE WHEN allocation_type <> 'OWNER' THEN amount ELSE 0 END), 0) AS deductions,
                COUNT(*) AS count
            FROM unified_allocations
            WHERE 1 = 1"#,
        );
        push_filter(&mut qb, filter);

        let row = qb
            .build_query_as::<TotalsRow>()
            .fetch_one(&self.pool)
            .await?;

        Ok(PendingTotals {
            income: row.income,
            deductions: row.deductions,
            net: row.income - row.deductions,
            count: row.count,
        })
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, MySql>, filter: &AllocationFilter) {
    if let Some(status) = filter.payment_status {
        qb.push(" AND payment_status = ").push_bind(status.as_str());
    }
    if let Some(allocation_type) = filter.allocation_type {
        qb.push(" AND allocation_type = ")
            .push_bind(allocation_type.as_str());
    }
    if let Some(property_id) = filter.property_id {
        qb.push(" AND property_id = ").push_bind(property_id);
    }
    if let Some(beneficiary_id) = filter.beneficiary_id {
        qb.push(" AND beneficiary_id = ").push_bind(beneficiary_id);
    }
    if let Some(ref batch_id) = filter.payment_batch_id {
        qb.push(" AND payment_batch_id = ").push_bind(batch_id.clone());
    }
}
