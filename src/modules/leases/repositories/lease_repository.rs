use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::leases::models::{Lease, NewLease};

#[async_trait]
pub trait LeaseRepository: Send + Sync {
    /// A duplicate `lease_reference` surfaces as a unique violation
    async fn create(&self, new: &NewLease) -> Result<Lease>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Lease>>;

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Lease>>;

    async fn list_by_property(&self, property_id: i64) -> Result<Vec<Lease>>;
}

const LEASE_COLUMNS: &str = r#"
    id, lease_reference, property_id, tenant_reference, amount, frequency,
    frequency_months, payment_day, start_date, end_date, description,
    sync_status, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
struct LeaseRow {
    id: i64,
    lease_reference: String,
    property_id: i64,
    tenant_reference: Option<String>,
    amount: Decimal,
    frequency: String,
    frequency_months: Option<i32>,
    payment_day: Option<i32>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    description: Option<String>,
    sync_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn to_u32(value: Option<i32>, column: &str) -> Result<Option<u32>> {
    value
        .map(|v| {
            u32::try_from(v).map_err(|_| AppError::internal(format!("Negative {}: {}", column, v)))
        })
        .transpose()
}

impl TryFrom<LeaseRow> for Lease {
    type Error = AppError;

    fn try_from(row: LeaseRow) -> Result<Self> {
        Ok(Lease {
            id: row.id,
            lease_reference: row.lease_reference,
            property_id: row.property_id,
            tenant_reference: row.tenant_reference,
            amount: row.amount,
            frequency: row.frequency.parse().map_err(AppError::Internal)?,
            frequency_months: to_u32(row.frequency_months, "frequency_months")?,
            payment_day: to_u32(row.payment_day, "payment_day")?,
            start_date: row.start_date,
            end_date: row.end_date,
            description: row.description,
            sync_status: row.sync_status.parse().map_err(AppError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct MySqlLeaseRepository {
    pool: MySqlPool,
}

impl MySqlLeaseRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Lease>> {
        let sql = format!("SELECT {} FROM leases WHERE {} = ?", LEASE_COLUMNS, column);
        let row = sqlx::query_as::<_, LeaseRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Lease::try_from).transpose()
    }
}

#[async_trait]
impl LeaseRepository for MySqlLeaseRepository {
    async fn create(&self, new: &NewLease) -> Result<Lease> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO leases (
                lease_reference, property_id, tenant_reference, amount, frequency,
                frequency_months, payment_day, start_date, end_date, description,
                sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.lease_reference)
        .bind(new.property_id)
        .bind(&new.tenant_reference)
        .bind(new.amount)
        .bind(new.frequency.as_str())
        .bind(new.frequency_months)
        .bind(new.payment_day)
        .bind(new.start_date)
        .bind(new.end_date)
        .bind(&new.description)
        .bind(new.sync_status.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_insert(e, format!("Lease reference {} already exists", new.lease_reference))
        })?;

        self.find_by_reference(&new.lease_reference)
            .await?
            .ok_or_else(|| {
                AppError::internal(format!("Lease {} vanished after insert", new.lease_reference))
            })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Lease>> {
        let sql = format!("SELECT {} FROM leases WHERE id = ?", LEASE_COLUMNS);
        let row = sqlx::query_as::<_, LeaseRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Lease::try_from).transpose()
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<Lease>> {
        self.find_one("lease_reference", reference).await
    }

    async fn list_by_property(&self, property_id: i64) -> Result<Vec<Lease>> {
        let sql = format!(
            "SELECT {} FROM leases WHERE property_id = ? ORDER BY start_date, id",
            LEASE_COLUMNS
        );
        let rows = sqlx::query_as::<_, LeaseRow>(&sql)
            .bind(property_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Lease::try_from).collect()
    }
}
