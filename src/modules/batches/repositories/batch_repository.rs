use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use crate::core::{AppError, Result};
use crate::modules::balances::models::{BalanceMovement, LedgerEntry};
use crate::modules::balances::repositories::apply_movements_in_tx;
use crate::modules::batches::models::{BatchStatus, PaymentBatch};

/// Payment batch persistence.
///
/// Every write that touches allocations or the ledger commits together with
/// the batch row.
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Number of batch ids already issued with this `<PREFIX>-<YYYYMMDD>-` prefix
    async fn count_with_prefix(&self, day_prefix: &str) -> Result<i64>;

    /// Inserts the batch, moves each allocation PENDING -> BATCHED and posts
    /// `movements`. Fails with `Conflict` if any allocation is no longer pending.
    async fn create_with_allocations(
        &self,
        batch: &PaymentBatch,
        allocation_ids: &[i64],
        movements: &[BalanceMovement],
    ) -> Result<(PaymentBatch, Vec<LedgerEntry>)>;

    async fn find_by_batch_id(&self, batch_id: &str) -> Result<Option<PaymentBatch>>;

    /// Persists the batch's adjustment fields if it had none, posting `movements`
    async fn save_adjustment(
        &self,
        batch: &PaymentBatch,
        movements: &[BalanceMovement],
    ) -> Result<Vec<LedgerEntry>>;

    /// Writes the new status only if the stored one is still `expected`
    async fn update_status(&self, batch: &PaymentBatch, expected: BatchStatus) -> Result<()>;

    /// Marks the batch and all its allocations paid
    async fn mark_paid(&self, batch: &PaymentBatch, expected: BatchStatus) -> Result<()>;

    async fn list_by_status(
        &self,
        statuses: &[BatchStatus],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentBatch>>;
}

const BATCH_COLUMNS: &str = r#"
    id, batch_id, batch_type, beneficiary_id, beneficiary_name, payment_date,
    total_allocations, balance_adjustment, adjustment_source, adjustment_notes,
    adjustment_property_id, total_payment, status, source, payment_reference,
    paid_date, notes, created_by, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct BatchRow {
    id: i64,
    batch_id: String,
    batch_type: String,
    beneficiary_id: i64,
    beneficiary_name: Option<String>,
    payment_date: NaiveDate,
    total_allocations: Decimal,
    balance_adjustment: Decimal,
    adjustment_source: String,
    adjustment_notes: Option<String>,
    adjustment_property_id: Option<i64>,
    total_payment: Decimal,
    status: String,
    source: String,
    payment_reference: Option<String>,
    paid_date: Option<NaiveDate>,
    notes: Option<String>,
    created_by: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for PaymentBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self> {
        Ok(PaymentBatch {
            id: row.id,
            batch_id: row.batch_id,
            batch_type: row.batch_type.parse().map_err(AppError::Internal)?,
            beneficiary_id: row.beneficiary_id,
            beneficiary_name: row.beneficiary_name,
            payment_date: row.payment_date,
            total_allocations: row.total_allocations,
            balance_adjustment: row.balance_adjustment,
            adjustment_source: row.adjustment_source.parse().map_err(AppError::Internal)?,
            adjustment_notes: row.adjustment_notes,
            adjustment_property_id: row.adjustment_property_id,
            total_payment: row.total_payment,
            status: row.status.parse().map_err(AppError::Internal)?,
            source: row.source.parse().map_err(AppError::Internal)?,
            payment_reference: row.payment_reference,
            paid_date: row.paid_date,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct MySqlBatchRepository {
    pool: MySqlPool,
}

impl MySqlBatchRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchRepository for MySqlBatchRepository {
    async fn count_with_prefix(&self, day_prefix: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM payment_batches WHERE batch_id LIKE ?")
                .bind(format!("{}%", day_prefix))
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn create_with_allocations(
        &self,
        batch: &PaymentBatch,
        allocation_ids: &[i64],
        movements: &[BalanceMovement],
    ) -> Result<(PaymentBatch, Vec<LedgerEntry>)> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO payment_batches (
                batch_id, batch_type, beneficiary_id, beneficiary_name, payment_date,
                total_allocations, balance_adjustment, adjustment_source, adjustment_notes,
                adjustment_property_id, total_payment, status, source, payment_reference,
                paid_date, notes, created_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&batch.batch_id)
        .bind(batch.batch_type.as_str())
        .bind(batch.beneficiary_id)
        .bind(&batch.beneficiary_name)
        .bind(batch.payment_date)
        .bind(batch.total_allocations)
        .bind(batch.balance_adjustment)
        .bind(batch.adjustment_source.as_str())
        .bind(&batch.adjustment_notes)
        .bind(batch.adjustment_property_id)
        .bind(batch.total_payment)
        .bind(batch.status.as_str())
        .bind(batch.source.as_str())
        .bind(&batch.payment_reference)
        .bind(batch.paid_date)
        .bind(&batch.notes)
        .bind(batch.created_by)
        .bind(batch.created_at)
        .bind(batch.updated_at)
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::from_insert(e, format!("Batch id {} is taken", batch.batch_id)))?;

        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
            "UPDATE unified_allocations SET payment_status = 'BATCHED', payment_batch_id = ",
        );
        qb.push_bind(&batch.batch_id)
            .push(", updated_at = ")
            .push_bind(batch.updated_at)
            .push(" WHERE payment_status = 'PENDING' AND id IN (");
        let mut separated = qb.separated(", ");
        for id in allocation_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let claimed = qb.build().execute(tx.as_mut()).await?.rows_affected();
        if claimed != allocation_ids.len() as u64 {
            return Err(AppError::conflict(format!(
                "{} of {} allocations were claimed by another batch",
                allocation_ids.len() as u64 - claimed,
                allocation_ids.len()
            )));
        }

        let entries = apply_movements_in_tx(&mut tx, movements).await?;
        tx.commit().await?;

        let mut created = batch.clone();
        created.id = result.last_insert_id() as i64;
        Ok((created, entries))
    }

    async fn find_by_batch_id(&self, batch_id: &str) -> Result<Option<PaymentBatch>> {
        let sql = format!(
            "SELECT {} FROM payment_batches WHERE batch_id = ?",
            BATCH_COLUMNS
        );
        let row = sqlx::query_as::<_, BatchRow>(&sql)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(PaymentBatch::try_from).transpose()
    }

    async fn save_adjustment(
        &self,
        batch: &PaymentBatch,
        movements: &[BalanceMovement],
    ) -> Result<Vec<LedgerEntry>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE payment_batches
            SET balance_adjustment = ?, adjustment_source = ?, adjustment_notes = ?,
                adjustment_property_id = ?, total_payment = ?, updated_at = ?
            WHERE batch_id = ? AND adjustment_source = 'NONE' AND status <> 'PAID'
            "#,
        )
        .bind(batch.balance_adjustment)
        .bind(batch.adjustment_source.as_str())
        .bind(&batch.adjustment_notes)
        .bind(batch.adjustment_property_id)
        .bind(batch.total_payment)
        .bind(batch.updated_at)
        .bind(&batch.batch_id)
        .execute(tx.as_mut())
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::conflict(format!(
                "Batch {} was adjusted or paid concurrently",
                batch.batch_id
            )));
        }

        let entries = apply_movements_in_tx(&mut tx, movements).await?;
        tx.commit().await?;
        Ok(entries)
    }

    async fn update_status(&self, batch: &PaymentBatch, expected: BatchStatus) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE payment_batches SET status = ?, updated_at = ? WHERE batch_id = ? AND status = ?",
        )
        .bind(batch.status.as_str())
        .bind(batch.updated_at)
        .bind(&batch.batch_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::conflict(format!(
                "Batch {} changed status concurrently",
                batch.batch_id
            )));
        }
        Ok(())
    }

    async fn mark_paid(&self, batch: &PaymentBatch, expected: BatchStatus) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE payment_batches
            SET status = 'PAID', paid_date = ?, payment_reference = ?, updated_at = ?
            WHERE batch_id = ? AND status = ?
            "#,
        )
        .bind(batch.paid_date)
        .bind(&batch.payment_reference)
        .bind(batch.updated_at)
        .bind(&batch.batch_id)
        .bind(expected.as_str())
        .execute(tx.as_mut())
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::conflict(format!(
                "Batch {} changed status concurrently",
                batch.batch_id
            )));
        }

        sqlx::query(
            r#"
            UPDATE unified_allocations
            SET payment_status = 'PAID', paid_date = ?, updated_at = ?
            WHERE payment_batch_id = ?
            "#,
        )
        .bind(batch.paid_date)
        .bind(batch.updated_at)
        .bind(&batch.batch_id)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_by_status(
        &self,
        statuses: &[BatchStatus],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentBatch>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM payment_batches WHERE status IN (",
            BATCH_COLUMNS
        ));
        let mut separated = qb.separated(", ");
        for status in statuses {
            separated.push_bind(status.as_str());
        }
        separated.push_unseparated(") ORDER BY payment_date, id LIMIT ");
        qb.push_bind(limit).push(" OFFSET ").push_bind(offset);

        let rows = qb
            .build_query_as::<BatchRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PaymentBatch::try_from).collect()
    }
}
