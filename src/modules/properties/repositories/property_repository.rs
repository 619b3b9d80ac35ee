use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use crate::core::{AppError, Result};
use crate::modules::properties::models::{
    NewProperty, OccupancyStatus, Property, PropertyFilter,
};

/// Property persistence
#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn create(&self, new: &NewProperty) -> Result<Property>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Property>>;

    /// Properties are referenced by name in CSV imports
    async fn find_by_name(&self, name: &str) -> Result<Option<Property>>;

    async fn find_by_payprop_id(&self, payprop_id: &str) -> Result<Option<Property>>;

    async fn list(&self, filter: &PropertyFilter) -> Result<Vec<Property>>;

    /// Writes occupancy fields only if the stored status is still `expected`.
    /// Returns false when another writer changed it first.
    async fn update_occupancy(&self, property: &Property, expected: OccupancyStatus)
        -> Result<bool>;

    /// Overwrites the cached account balance
    async fn set_account_balance(&self, id: i64, balance: Decimal) -> Result<()>;

    /// Sum of cached balances over every property of the owner
    async fn total_balance_for_owner(&self, owner_id: i64) -> Result<Decimal>;
}

pub(crate) const PROPERTY_COLUMNS: &str = r#"
    id, name, payprop_id, owner_id, owner_name, is_block_property, block_property_id,
    account_balance, minimum_balance, occupancy_status, notice_given_date,
    expected_vacancy_date, advertising_start_date, available_from_date,
    last_occupancy_change, created_at, updated_at
"#;

#[derive(Debug, FromRow)]
pub(crate) struct PropertyRow {
    id: i64,
    name: String,
    payprop_id: Option<String>,
    owner_id: Option<i64>,
    owner_name: Option<String>,
    is_block_property: bool,
    block_property_id: Option<i64>,
    account_balance: Decimal,
    minimum_balance: Decimal,
    occupancy_status: String,
    notice_given_date: Option<NaiveDate>,
    expected_vacancy_date: Option<NaiveDate>,
    advertising_start_date: Option<NaiveDate>,
    available_from_date: Option<NaiveDate>,
    last_occupancy_change: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PropertyRow> for Property {
    type Error = AppError;

    fn try_from(row: PropertyRow) -> Result<Self> {
        Ok(Property {
            id: row.id,
            name: row.name,
            payprop_id: row.payprop_id,
            owner_id: row.owner_id,
            owner_name: row.owner_name,
            is_block_property: row.is_block_property,
            block_property_id: row.block_property_id,
            account_balance: row.account_balance,
            minimum_balance: row.minimum_balance,
            occupancy_status: row
                .occupancy_status
                .parse()
                .map_err(AppError::Internal)?,
            notice_given_date: row.notice_given_date,
            expected_vacancy_date: row.expected_vacancy_date,
            advertising_start_date: row.advertising_start_date,
            available_from_date: row.available_from_date,
            last_occupancy_change: row.last_occupancy_change,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct MySqlPropertyRepository {
    pool: MySqlPool,
}

impl MySqlPropertyRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<Property>> {
        let sql = format!(
            "SELECT {} FROM properties WHERE {} = ? LIMIT 1",
            PROPERTY_COLUMNS, column
        );
        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Property::try_from).transpose()
    }
}

#[async_trait]
impl PropertyRepository for MySqlPropertyRepository {
    async fn create(&self, new: &NewProperty) -> Result<Property> {
        let result = sqlx::query(
            r#"
            INSERT INTO properties (
                name, payprop_id, owner_id, owner_name, is_block_property,
                block_property_id, account_balance, minimum_balance, occupancy_status
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.payprop_id)
        .bind(new.owner_id)
        .bind(&new.owner_name)
        .bind(new.is_block_property)
        .bind(new.block_property_id)
        .bind(new.minimum_balance)
        .bind(OccupancyStatus::default().as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::from_insert(e, format!("Property '{}' already exists", new.name)))?;

        let id = result.last_insert_id() as i64;
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::internal(format!("Property {} vanished after insert", id)))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Property>> {
        let sql = format!("SELECT {} FROM properties WHERE id = ?", PROPERTY_COLUMNS);
        let row = sqlx::query_as::<_, PropertyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Property::try_from).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Property>> {
        self.find_one("name", name.trim()).await
    }

    async fn find_by_payprop_id(&self, payprop_id: &str) -> Result<Option<Property>> {
        self.find_one("payprop_id", payprop_id).await
    }

    async fn list(&self, filter: &PropertyFilter) -> Result<Vec<Property>> {
        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM properties WHERE 1 = 1",
            PROPERTY_COLUMNS
        ));

        if let Some(status) = filter.occupancy_status {
            qb.push(" AND occupancy_status = ").push_bind(status.as_str());
        }
        if let Some(owner_id) = filter.owner_id {
            qb.push(" AND owner_id = ").push_bind(owner_id);
        }
        if let Some(block_id) = filter.block_property_id {
            qb.push(" AND block_property_id = ").push_bind(block_id);
        }

        qb.push(" ORDER BY name ASC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows = qb
            .build_query_as::<PropertyRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Property::try_from).collect()
    }

    async fn update_occupancy(
        &self,
        property: &Property,
        expected: OccupancyStatus,
    ) -> Result<bool> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE properties
            SET occupancy_status = ?,
                notice_given_date = ?,
                expected_vacancy_date = ?,
                advertising_start_date = ?,
                available_from_date = ?,
                last_occupancy_change = ?,
                updated_at = ?
            WHERE id = ? AND occupancy_status = ?
            "#,
        )
        .bind(property.occupancy_status.as_str())
        .bind(property.notice_given_date)
        .bind(property.expected_vacancy_date)
        .bind(property.advertising_start_date)
        .bind(property.available_from_date)
        .bind(property.last_occupancy_change)
        .bind(property.updated_at)
        .bind(property.id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(rows_affected == 1)
    }

    async fn set_account_balance(&self, id: i64, balance: Decimal) -> Result<()> {
        let rows_affected = sqlx::query(
            "UPDATE properties SET account_balance = ?, updated_at = NOW() WHERE id = ?",
        )
        .bind(balance)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found(format!("Property {}", id)));
        }

        Ok(())
    }

    async fn total_balance_for_owner(&self, owner_id: i64) -> Result<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(account_balance), 0) FROM properties WHERE owner_id = ?",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
