use chrono::{DateTime, NaiveDate, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::import::{optional_field, parse_amount, parse_date, required_field};

/// Column layout of a historical transaction import
pub const TRANSACTION_CSV_HEADER: &[&str] = &[
    "transaction_date",
    "amount",
    "description",
    "transaction_type",
    "category",
    "property_reference",
    "customer_reference",
    "bank_reference",
    "payment_method",
    "notes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    Fee,
    Expense,
    Deposit,
    Other,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "PAYMENT",
            TransactionType::Fee => "FEE",
            TransactionType::Expense => "EXPENSE",
            TransactionType::Deposit => "DEPOSIT",
            TransactionType::Other => "OTHER",
        }
    }

    /// Maps the free-text type column of bank exports
    pub fn from_import_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "deposit" | "payment" | "rent" => TransactionType::Payment,
            "fee" | "commission" => TransactionType::Fee,
            "expense" | "maintenance" => TransactionType::Expense,
            _ => TransactionType::Other,
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAYMENT" => Ok(TransactionType::Payment),
            "FEE" => Ok(TransactionType::Fee),
            "EXPENSE" => Ok(TransactionType::Expense),
            "DEPOSIT" => Ok(TransactionType::Deposit),
            "OTHER" => Ok(TransactionType::Other),
            _ => Err(format!("Invalid transaction type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalTransaction {
    pub id: i64,
    pub transaction_date: NaiveDate,
    /// Signed as it appeared on the statement
    pub amount: Decimal,
    pub description: String,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
    pub property_id: Option<i64>,
    pub property_reference: Option<String>,
    pub customer_reference: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub import_batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoricalTransaction {
    pub transaction_date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
    pub property_id: Option<i64>,
    pub property_reference: Option<String>,
    pub customer_reference: Option<String>,
    pub bank_reference: Option<String>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub import_batch_id: Option<String>,
}

impl NewHistoricalTransaction {
    /// Parses one data row of a transaction import. The property is resolved later.
    pub fn from_record(record: &StringRecord) -> Result<Self, String> {
        let date = required_field(record, 0, "transaction_date")?;
        let transaction_date = parse_date(&date, &["%Y-%m-%d"])?;

        let amount = parse_amount(&required_field(record, 1, "amount")?)?;
        if amount.is_zero() {
            return Err("Amount must not be zero".to_string());
        }

        let description = required_field(record, 2, "description")?;
        let transaction_type = optional_field(record, 3)
            .map(|t| TransactionType::from_import_label(&t))
            .unwrap_or(TransactionType::Other);

        Ok(Self {
            transaction_date,
            amount,
            description,
            transaction_type,
            category: optional_field(record, 4),
            property_id: None,
            property_reference: optional_field(record, 5),
            customer_reference: optional_field(record, 6),
            bank_reference: optional_field(record, 7),
            payment_method: optional_field(record, 8),
            notes: optional_field(record, 9),
            import_batch_id: None,
        })
    }
}

/// Outcome of a transaction import
#[derive(Debug, Clone, Serialize)]
pub struct TransactionImportReport {
    pub import_batch_id: String,
    pub imported: usize,
    pub unresolved_properties: usize,
    pub errors: Vec<crate::core::import::ImportLineError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionListQuery {
    pub property_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}
