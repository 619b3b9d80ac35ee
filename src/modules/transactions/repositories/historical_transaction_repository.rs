use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, QueryBuilder};

use crate::core::{AppError, Result};
use crate::modules::transactions::models::{HistoricalTransaction, NewHistoricalTransaction};

#[async_trait]
pub trait HistoricalTransactionRepository: Send + Sync {
    /// Inserts every row of one import in a single transaction
    async fn insert_all(&self, rows: &[NewHistoricalTransaction]) -> Result<Vec<HistoricalTransaction>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<HistoricalTransaction>>;

    async fn list(
        &self,
        property_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoricalTransaction>>;
}

const TRANSACTION_COLUMNS: &str = r#"
    id, transaction_date, amount, description, transaction_type, category, property_id,
    property_reference, customer_reference, bank_reference, payment_method, notes,
    import_batch_id, created_at
"#;

#[derive(Debug, FromRow)]
struct HistoricalTransactionRow {
    id: i64,
    transaction_date: NaiveDate,
    amount: Decimal,
    description: String,
    transaction_type: String,
    category: Option<String>,
    property_id: Option<i64>,
    property_reference: Option<String>,
    customer_reference: Option<String>,
    bank_reference: Option<String>,
    payment_method: Option<String>,
    notes: Option<String>,
    import_batch_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<HistoricalTransactionRow> for HistoricalTransaction {
    type Error = AppError;

    fn try_from(row: HistoricalTransactionRow) -> Result<Self> {
        Ok(HistoricalTransaction {
            id: row.id,
            transaction_date: row.transaction_date,
            amount: row.amount,
            description: row.description,
            transaction_type: row.transaction_type.parse().map_err(AppError::Internal)?,
            category: row.category,
            property_id: row.property_id,
            property_reference: row.property_reference,
            customer_reference: row.customer_reference,
            bank_reference: row.bank_reference,
            payment_method: row.payment_method,
            notes: row.notes,
            import_batch_id: row.import_batch_id,
            created_at: row.created_at,
        })
    }
}

pub struct MySqlHistoricalTransactionRepository {
    pool: MySqlPool,
}

impl MySqlHistoricalTransactionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoricalTransactionRepository for MySqlHistoricalTransactionRepository {
    async fn insert_all(&self, rows: &[NewHistoricalTransaction]) -> Result<Vec<HistoricalTransaction>> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO historical_transactions (
                    transaction_date, amount, description, transaction_type, category,
                    property_id, property_reference, customer_reference, bank_reference,
                    payment_method, notes, import_batch_id, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(row.transaction_date)
            .bind(row.amount)
            .bind(&row.description)
            .bind(row.transaction_type.as_str())
            .bind(&row.category)
            .bind(row.property_id)
            .bind(&row.property_reference)
            .bind(&row.customer_reference)
            .bind(&row.bank_reference)
            .bind(&row.payment_method)
            .bind(&row.notes)
            .bind(&row.import_batch_id)
            .bind(now)
            .execute(tx.as_mut())
            .await?;

            inserted.push(HistoricalTransaction {
                id: result.last_insert_id() as i64,
                transaction_date: row.transaction_date,
                amount: row.amount,
                description: row.description.clone(),
                transaction_type: row.transaction_type,
                category: row.category.clone(),
                property_id: row.property_id,
                property_reference: row.property_reference.clone(),
                customer_reference: row.customer_reference.clone(),
                bank_reference: row.bank_reference.clone(),
                payment_method: row.payment_method.clone(),
                notes: row.notes.clone(),
                import_batch_id: row.import_batch_id.clone(),
                created_at: now,
            });
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<HistoricalTransaction>> {
        let sql = format!(
            "SELECT {} FROM historical_transactions WHERE id = ?",
            TRANSACTION_COLUMNS
        );
        let row = sqlx::query_as::<_, HistoricalTransactionRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(HistoricalTransaction::try_from).transpose()
    }

    async fn list(
        &self,
        property_id: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HistoricalTransaction>> {
        let mut qb: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM historical_transactions WHERE 1 = 1",
            TRANSACTION_COLUMNS
        ));
        if let Some(property_id) = property_id {
            qb.push(" AND property_id = ").push_bind(property_id);
        }
        qb.push(" ORDER BY transaction_date DESC, id DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb
            .build_query_as::<HistoricalTransactionRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(HistoricalTransaction::try_from).collect()
    }
}
