// Unified allocations tie a transaction to a payment owed to a beneficiary.
//
// Amounts are stored as magnitudes; the allocation type carries direction.
// From the owner's payment run, OWNER income adds and every other type
// (expenses, commission, disbursements) is deducted.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{money, AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationType {
    Owner,
    Expense,
    Commission,
    Disbursement,
    Other,
}

impl AllocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationType::Owner => "OWNER",
            AllocationType::Expense => "EXPENSE",
            AllocationType::Commission => "COMMISSION",
            AllocationType::Disbursement => "DISBURSEMENT",
            AllocationType::Other => "OTHER",
        }
    }

    /// +1 for owner income, -1 for deductions
    pub fn sign(&self) -> Decimal {
        match self {
            AllocationType::Owner => Decimal::ONE,
            _ => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for AllocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AllocationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OWNER" => Ok(AllocationType::Owner),
            "EXPENSE" => Ok(AllocationType::Expense),
            "COMMISSION" => Ok(AllocationType::Commission),
            "DISBURSEMENT" => Ok(AllocationType::Disbursement),
            "OTHER" => Ok(AllocationType::Other),
            _ => Err(format!("Invalid allocation type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Batched,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Batched => "BATCHED",
            PaymentStatus::Paid => "PAID",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "BATCHED" => Ok(PaymentStatus::Batched),
            "PAID" => Ok(PaymentStatus::Paid),
            _ => Err(format!("Invalid payment status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationSource {
    Manual,
    Auto,
    #[serde(rename = "PAYPROP")]
    PayProp,
    CsvImport,
}

impl AllocationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationSource::Manual => "MANUAL",
            AllocationSource::Auto => "AUTO",
            AllocationSource::PayProp => "PAYPROP",
            AllocationSource::CsvImport => "CSV_IMPORT",
        }
    }
}

impl std::str::FromStr for AllocationSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(AllocationSource::Manual),
            "AUTO" => Ok(AllocationSource::Auto),
            "PAYPROP" => Ok(AllocationSource::PayProp),
            "CSV_IMPORT" => Ok(AllocationSource::CsvImport),
            _ => Err(format!("Invalid allocation source: {}", s)),
        }
    }
}

/// The transaction an allocation was derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TransactionKey {
    Historical(i64),
    #[serde(rename = "payprop")]
    PayProp(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAllocation {
    pub id: i64,
    pub transaction_id: Option<i64>,
    pub payprop_payment_id: Option<String>,
    pub allocation_type: AllocationType,
    /// Always positive
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    pub property_id: Option<i64>,
    pub property_name: Option<String>,
    pub beneficiary_id: Option<i64>,
    pub beneficiary_name: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_batch_id: Option<String>,
    pub paid_date: Option<NaiveDate>,
    pub source: AllocationSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UnifiedAllocation {
    /// Contribution to an owner payment run
    pub fn signed_amount(&self) -> Decimal {
        self.allocation_type.sign() * self.amount
    }

    pub fn is_pending(&self) -> bool {
        self.payment_status == PaymentStatus::Pending
    }

    pub fn transaction_key(&self) -> Option<TransactionKey> {
        match (&self.payprop_payment_id, self.transaction_id) {
            (Some(payment_id), _) => Some(TransactionKey::PayProp(payment_id.clone())),
            (None, Some(id)) => Some(TransactionKey::Historical(id)),
            (None, None) => None,
        }
    }
}

/// Signed sum of allocations: OWNER adds, everything else subtracts
pub fn signed_total<'a, I>(allocations: I) -> Decimal
where
    I: IntoIterator<Item = &'a UnifiedAllocation>,
{
    allocations.into_iter().map(|a| a.signed_amount()).sum()
}

/// Allocation to insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAllocation {
    pub transaction: Option<TransactionKey>,
    pub allocation_type: AllocationType,
    /// Sign is ignored; direction comes from `allocation_type`
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    pub property_id: Option<i64>,
    pub property_name: Option<String>,
    pub beneficiary_id: Option<i64>,
    pub beneficiary_name: Option<String>,
    pub source: AllocationSource,
    /// Set for payments already settled upstream; the allocation starts PAID
    pub settled: Option<Settlement>,
}

/// Upstream settlement carried by already-paid imports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub batch_reference: String,
    pub paid_date: NaiveDate,
}

impl NewAllocation {
    /// Validates and normalizes the amount to a positive magnitude
    pub fn normalized(mut self) -> Result<Self> {
        let amount = money::require_non_zero(self.amount, "Allocation amount")?;
        self.amount = amount.abs();

        if self.transaction.is_none() && self.source != AllocationSource::Manual {
            return Err(AppError::validation(
                "Only manual allocations may omit their source transaction",
            ));
        }

        Ok(self)
    }

    pub fn initial_status(&self) -> PaymentStatus {
        if self.settled.is_some() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        }
    }
}

/// Filter for allocation listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationFilter {
    pub payment_status: Option<PaymentStatus>,
    pub allocation_type: Option<AllocationType>,
    pub property_id: Option<i64>,
    pub beneficiary_id: Option<i64>,
    pub payment_batch_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl AllocationFilter {
    pub fn pending() -> Self {
        Self {
            payment_status: Some(PaymentStatus::Pending),
            limit: i64::from(u16::MAX),
            ..Self::default()
        }
    }

    pub fn matches(&self, allocation: &UnifiedAllocation) -> bool {
        self.payment_status
            .map_or(true, |s| allocation.payment_status == s)
            && self
                .allocation_type
                .map_or(true, |t| allocation.allocation_type == t)
            && self
                .property_id
                .map_or(true, |p| allocation.property_id == Some(p))
            && self
                .beneficiary_id
                .map_or(true, |b| allocation.beneficiary_id == Some(b))
            && self
                .payment_batch_id
                .as_ref()
                .map_or(true, |b| allocation.payment_batch_id.as_ref() == Some(b))
    }
}

/// Signed totals of a set of allocations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PendingTotals {
    pub income: Decimal,
    pub deductions: Decimal,
    pub net: Decimal,
    pub count: i64,
}

impl PendingTotals {
    pub fn from_allocations<'a, I>(allocations: I) -> Self
    where
        I: IntoIterator<Item = &'a UnifiedAllocation>,
    {
        let mut totals = PendingTotals::default();
        for allocation in allocations {
            if allocation.allocation_type == AllocationType::Owner {
                totals.income += allocation.amount;
            } else {
                totals.deductions += allocation.amount;
            }
            totals.count += 1;
        }
        totals.net = totals.income - totals.deductions;
        totals
    }
}
