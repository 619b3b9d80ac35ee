use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder, Transaction};

use crate::core::{AppError, Result};
use crate::modules::balances::models::{
    post_movements, touched_property_ids, AccountState, BalanceMovement, LedgerEntry, LedgerQuery,
    UnitContribution,
};

/// Append-only property balance ledger
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Posts all movements and updates the affected account balances atomically
    async fn apply(&self, movements: &[BalanceMovement]) -> Result<Vec<LedgerEntry>>;

    async fn has_entries(&self, property_id: i64) -> Result<bool>;

    /// Most recently posted entry
    async fn latest_entry(&self, property_id: i64) -> Result<Option<LedgerEntry>>;

    /// Latest entry dated on or before `date`
    async fn latest_entry_as_of(
        &self,
        property_id: i64,
        date: NaiveDate,
    ) -> Result<Option<LedgerEntry>>;

    /// Entries newest first
    async fn history(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>>;

    async fn count(&self, query: &LedgerQuery) -> Result<i64>;

    /// TRANSFER_IN totals on a block grouped by contributing unit
    async fn unit_contributions(
        &self,
        block_property_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<UnitContribution>>;
}

const LEDGER_COLUMNS: &str = r#"
    id, property_id, property_name, owner_id, entry_type, amount, running_balance,
    description, notes, payment_batch_id, reference, related_property_id,
    related_property_name, source, entry_date, created_by, created_at
"#;

#[derive(Debug, FromRow)]
struct LedgerRow {
    id: i64,
    property_id: i64,
    property_name: String,
    owner_id: Option<i64>,
    entry_type: String,
    amount: Decimal,
    running_balance: Decimal,
    description: String,
    notes: Option<String>,
    payment_batch_id: Option<String>,
    reference: Option<String>,
    related_property_id: Option<i64>,
    related_property_name: Option<String>,
    source: String,
    entry_date: NaiveDate,
    created_by: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: LedgerRow) -> Result<Self> {
        Ok(LedgerEntry {
            id: row.id,
            property_id: row.property_id,
            property_name: row.property_name,
            owner_id: row.owner_id,
            entry_type: row.entry_type.parse().map_err(AppError::Internal)?,
            amount: row.amount,
            running_balance: row.running_balance,
            description: row.description,
            notes: row.notes,
            payment_batch_id: row.payment_batch_id,
            reference: row.reference,
            related_property_id: row.related_property_id,
            related_property_name: row.related_property_name,
            source: row.source.parse().map_err(AppError::Internal)?,
            entry_date: row.entry_date,
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: i64,
    name: String,
    owner_id: Option<i64>,
    account_balance: Decimal,
    minimum_balance: Decimal,
    has_entries: i64,
}

/// Posts movements inside an open transaction.
///
/// Locks every touched property row in ascending id order, computes running
/// balances, inserts the ledger rows and rewrites the cached balances. Batch
/// creation and adjustment reuse this so their ledger effects commit with them.
pub(crate) async fn apply_movements_in_tx(
    tx: &mut Transaction<'_, MySql>,
    movements: &[BalanceMovement],
) -> Result<Vec<LedgerEntry>> {
    if movements.is_empty() {
        return Ok(Vec::new());
    }

    let ids = touched_property_ids(movements);
    let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
        r#"
        SELECT p.id, p.name, p.owner_id, p.account_balance, p.minimum_balance,
               CAST(EXISTS(
                   SELECT 1 FROM property_balance_ledger l WHERE l.property_id = p.id
               ) AS SIGNED) AS has_entries
        FROM properties p
        WHERE p.id IN (
        "#,
    );
    let mut separated = qb.separated(", ");
    for id in &ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY p.id FOR UPDATE");

    let rows = qb
        .build_query_as::<AccountRow>()
        .fetch_all(tx.as_mut())
        .await?;

    let mut accounts: BTreeMap<i64, AccountState> = rows
        .into_iter()
        .map(|row| {
            (
                row.id,
                AccountState {
                    property_id: row.id,
                    property_name: row.name,
                    owner_id: row.owner_id,
                    balance: row.account_balance,
                    minimum_balance: row.minimum_balance,
                    has_entries: row.has_entries != 0,
                },
            )
        })
        .collect();

    let posted = post_movements(&mut accounts, movements)?;
    let now = Utc::now();
    let mut entries = Vec::with_capacity(posted.len());

    for entry in posted {
        let result = sqlx::query(
            r#"
            INSERT INTO property_balance_ledger (
                property_id, property_name, owner_id, entry_type, amount, running_balance,
                description, notes, payment_batch_id, reference, related_property_id,
                related_property_name, source, entry_date, created_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.property_id)
        .bind(&entry.property_name)
        .bind(entry.owner_id)
        .bind(entry.entry_type.as_str())
        .bind(entry.amount)
        .bind(entry.running_balance)
        .bind(&entry.description)
        .bind(&entry.notes)
        .bind(&entry.payment_batch_id)
        .bind(&entry.reference)
        .bind(entry.related_property_id)
        .bind(&entry.related_property_name)
        .bind(entry.source.as_str())
        .bind(entry.entry_date)
        .bind(entry.created_by)
        .bind(now)
        .execute(tx.as_mut())
        .await?;

        entries.push(LedgerEntry::from_new(
            entry,
            result.last_insert_id() as i64,
            now,
        ));
    }

    for account in accounts.values() {
        if !movements.iter().any(|m| m.property_id == account.property_id) {
            continue;
        }
        sqlx::query("UPDATE properties SET account_balance = ?, updated_at = ? WHERE id = ?")
            .bind(account.balance)
            .bind(now)
            .bind(account.property_id)
            .execute(tx.as_mut())
            .await?;
    }

    Ok(entries)
}

fn push_filters(qb: &mut QueryBuilder<'_, MySql>, query: &LedgerQuery) {
    if let Some(property_id) = query.property_id {
        qb.push(" AND property_id = ").push_bind(property_id);
    }
    if let Some(owner_id) = query.owner_id {
        qb.push(" AND owner_id = ").push_bind(owner_id);
    }
    if let Some(ref batch_id) = query.payment_batch_id {
        qb.push(" AND payment_batch_id = ").push_bind(batch_id.clone());
    }
    if let Some(from) = query.from {
        qb.push(" AND entry_date >= ").push_bind(from);
    }
    if let Some(to) = query.to {
        qb.push(" AND entry_date <= ").push_bind(to);
    }
}

pub struct MySqlLedgerRepository {
    pool: MySqlPool,
}

impl MySqlLedgerRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerRepository for MySqlLedgerRepository {
    async fn apply(&self, movements: &[BalanceMovement]) -> Result<Vec<LedgerEntry>> {
        let mut tx = self.pool.begin().await?;
        let entries = apply_movements_in_tx(&mut tx, movements).await?;
        tx.commit().await?;
        Ok(entries)
    }

    async fn has_entries(&self, property_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM property_balance_ledger WHERE property_id = ?",
        )
        .bind(property_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn latest_entry(&self, property_id: i64) -> Result<Option<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM property_balance_ledger WHERE property_id = ? ORDER BY id DESC LIMIT 1",
            LEDGER_COLUMNS
        );
        let row = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(property_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(LedgerEntry::try_from).transpose()
    }

    async fn latest_entry_as_of(
        &self,
        property_id: i64,
        date: NaiveDate,
    ) -> Result<Option<LedgerEntry>> {
        let sql = format!(
            r#"
            SELECT {} FROM property_balance_ledger
            WHERE property_id = ? AND entry_date <= ?
            ORDER BY entry_date DESC, id DESC
            LIMIT 1
            "#,
            LEDGER_COLUMNS
        );
        let row = sqlx::query_as::<_, LedgerRow>(&sql)
            .bind(property_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(LedgerEntry::try_from).transpose()
    }

    async fn history(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>> {
        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM property_balance_ledger WHERE 1 = 1",
            LEDGER_COLUMNS
        ));
        push_filters(&mut qb, query);
        qb.push(" ORDER BY entry_date DESC, id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows = qb
            .build_query_as::<LedgerRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn count(&self, query: &LedgerQuery) -> Result<i64> {
        let mut qb: QueryBuilder<MySql> =
            QueryBuilder::new("SELECT COUNT(*) FROM property_balance_ledger WHERE 1 = 1");
        push_filters(&mut qb, query);

        let count = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn unit_contributions(
        &self,
        block_property_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<UnitContribution>> {
        let rows = sqlx::query_as::<_, UnitContribution>(
            r#"
            SELECT related_property_id AS unit_property_id,
                   MAX(related_property_name) AS unit_property_name,
                   SUM(amount) AS total,
                   COUNT(*) AS entry_count
            FROM property_balance_ledger
            WHERE property_id = ?
              AND entry_type = 'TRANSFER_IN'
              AND related_property_id IS NOT NULL
              AND entry_date BETWEEN ? AND ?
            GROUP BY related_property_id
            ORDER BY total DESC
            "#,
        )
        .bind(block_property_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
