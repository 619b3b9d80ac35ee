// Payment batches group pending allocations into one payment to a beneficiary.
//
// Lifecycle: DRAFT -> PENDING -> PAID, or DRAFT -> PAID directly. A batch
// carries at most one balance adjustment, and total_payment is always
// total_allocations + balance_adjustment.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{money, AppError, Result};
use crate::modules::allocations::models::{AllocationType, UnifiedAllocation};
use crate::modules::balances::models::LedgerSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchType {
    OwnerPayment,
    ExpensePayment,
    Commission,
    Disbursement,
}

impl BatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchType::OwnerPayment => "OWNER_PAYMENT",
            BatchType::ExpensePayment => "EXPENSE_PAYMENT",
            BatchType::Commission => "COMMISSION",
            BatchType::Disbursement => "DISBURSEMENT",
        }
    }

    /// Leading segment of generated batch ids
    pub fn prefix(&self) -> &'static str {
        match self {
            BatchType::OwnerPayment => "OWNER",
            BatchType::ExpensePayment => "EXP",
            BatchType::Commission => "COMM",
            BatchType::Disbursement => "DISB",
        }
    }

    /// Batch type used when a single allocation is paid on its own
    pub fn for_allocation(allocation_type: AllocationType) -> Self {
        match allocation_type {
            AllocationType::Owner => BatchType::OwnerPayment,
            AllocationType::Expense | AllocationType::Other => BatchType::ExpensePayment,
            AllocationType::Commission => BatchType::Commission,
            AllocationType::Disbursement => BatchType::Disbursement,
        }
    }
}

impl std::fmt::Display for BatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BatchType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "OWNER_PAYMENT" => Ok(BatchType::OwnerPayment),
            "EXPENSE_PAYMENT" => Ok(BatchType::ExpensePayment),
            "COMMISSION" => Ok(BatchType::Commission),
            "DISBURSEMENT" => Ok(BatchType::Disbursement),
            _ => Err(format!("Invalid batch type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Draft,
    Pending,
    Paid,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "DRAFT",
            BatchStatus::Pending => "PENDING",
            BatchStatus::Paid => "PAID",
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, BatchStatus::Paid)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(BatchStatus::Draft),
            "PENDING" => Ok(BatchStatus::Pending),
            "PAID" => Ok(BatchStatus::Paid),
            _ => Err(format!("Invalid batch status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentSource {
    #[default]
    None,
    Block,
    OwnerBalance,
}

impl AdjustmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentSource::None => "NONE",
            AdjustmentSource::Block => "BLOCK",
            AdjustmentSource::OwnerBalance => "OWNER_BALANCE",
        }
    }

    /// Ledger source recorded when the adjustment moves property funds
    pub fn ledger_source(&self) -> LedgerSource {
        match self {
            AdjustmentSource::Block => LedgerSource::BlockTransfer,
            _ => LedgerSource::PaymentBatch,
        }
    }
}

impl std::str::FromStr for AdjustmentSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(AdjustmentSource::None),
            "BLOCK" => Ok(AdjustmentSource::Block),
            "OWNER_BALANCE" => Ok(AdjustmentSource::OwnerBalance),
            _ => Err(format!("Invalid adjustment source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchSource {
    #[default]
    Manual,
    #[serde(rename = "PAYPROP")]
    PayProp,
}

impl BatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchSource::Manual => "MANUAL",
            BatchSource::PayProp => "PAYPROP",
        }
    }
}

impl std::str::FromStr for BatchSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MANUAL" => Ok(BatchSource::Manual),
            "PAYPROP" => Ok(BatchSource::PayProp),
            _ => Err(format!("Invalid batch source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBatch {
    pub id: i64,
    pub batch_id: String,
    pub batch_type: BatchType,
    pub beneficiary_id: i64,
    pub beneficiary_name: Option<String>,
    pub payment_date: NaiveDate,
    pub total_allocations: Decimal,
    pub balance_adjustment: Decimal,
    pub adjustment_source: AdjustmentSource,
    pub adjustment_notes: Option<String>,
    pub adjustment_property_id: Option<i64>,
    pub total_payment: Decimal,
    pub status: BatchStatus,
    pub source: BatchSource,
    pub payment_reference: Option<String>,
    pub paid_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of a mark-paid request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidTransition {
    /// Status changed; the allocation cascade must run
    Applied { previous: BatchStatus },
    /// Already paid with identical details; nothing to write
    AlreadyPaid,
}

/// `<PREFIX>-<YYYYMMDD>-<NNNN>`
pub fn generate_batch_id(batch_type: BatchType, date: NaiveDate, sequence: u32) -> String {
    format!(
        "{}-{}-{:04}",
        batch_type.prefix(),
        date.format("%Y%m%d"),
        sequence
    )
}

/// Batch ids sharing a prefix and day start with this
pub fn batch_id_day_prefix(batch_type: BatchType, date: NaiveDate) -> String {
    format!("{}-{}-", batch_type.prefix(), date.format("%Y%m%d"))
}

/// Amount actually paid out
pub fn total_payment(total_allocations: Decimal, balance_adjustment: Decimal) -> Decimal {
    total_allocations + balance_adjustment
}

impl PaymentBatch {
    /// New DRAFT batch over allocations summing to `total_allocations`
    pub fn draft(batch_id: String, request: &BatchRequest, total_allocations: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            batch_id,
            batch_type: request.batch_type,
            beneficiary_id: request.beneficiary_id,
            beneficiary_name: request.beneficiary_name.clone(),
            payment_date: request.payment_date,
            total_allocations,
            balance_adjustment: Decimal::ZERO,
            adjustment_source: AdjustmentSource::None,
            adjustment_notes: None,
            adjustment_property_id: None,
            total_payment: total_allocations,
            status: BatchStatus::Draft,
            source: BatchSource::Manual,
            payment_reference: None,
            paid_date: None,
            notes: request.notes.clone(),
            created_by: request.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_adjustment(&self) -> bool {
        self.adjustment_source != AdjustmentSource::None || !self.balance_adjustment.is_zero()
    }

    /// Records the batch's single balance adjustment
    pub fn apply_adjustment(
        &mut self,
        amount: Decimal,
        source: AdjustmentSource,
        notes: Option<String>,
        property_id: Option<i64>,
    ) -> Result<()> {
        let amount = money::require_non_zero(amount, "Adjustment amount")?;
        if source == AdjustmentSource::None {
            return Err(AppError::validation(
                "Adjustment source must be BLOCK or OWNER_BALANCE",
            ));
        }
        if self.status == BatchStatus::Paid {
            return Err(AppError::conflict(format!(
                "Batch {} is already paid",
                self.batch_id
            )));
        }
        if self.has_adjustment() {
            return Err(AppError::conflict(format!(
                "Batch {} already has a balance adjustment",
                self.batch_id
            )));
        }

        self.balance_adjustment = amount;
        self.adjustment_source = source;
        self.adjustment_notes = notes;
        self.adjustment_property_id = property_id;
        self.total_payment = total_payment(self.total_allocations, amount);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_pending(&mut self) -> Result<()> {
        if self.status != BatchStatus::Draft {
            return Err(AppError::conflict(format!(
                "Batch {} is {}; only DRAFT batches can be marked pending",
                self.batch_id, self.status
            )));
        }
        self.status = BatchStatus::Pending;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_paid(
        &mut self,
        paid_date: NaiveDate,
        payment_reference: Option<String>,
    ) -> Result<PaidTransition> {
        let payment_reference = payment_reference.filter(|r| !r.trim().is_empty());

        if self.status == BatchStatus::Paid {
            if self.paid_date == Some(paid_date) && self.payment_reference == payment_reference {
                return Ok(PaidTransition::AlreadyPaid);
            }
            return Err(AppError::conflict(format!(
                "Batch {} was already paid on {} with different details",
                self.batch_id,
                self.paid_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "an unknown date".to_string())
            )));
        }

        let previous = self.status;
        self.status = BatchStatus::Paid;
        self.paid_date = Some(paid_date);
        self.payment_reference = payment_reference;
        self.updated_at = Utc::now();
        Ok(PaidTransition::Applied { previous })
    }
}

/// Parameters of a new batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub allocation_ids: Vec<i64>,
    pub batch_type: BatchType,
    pub payment_date: NaiveDate,
    pub beneficiary_id: i64,
    pub beneficiary_name: Option<String>,
    pub notes: Option<String>,
    #[serde(skip)]
    pub created_by: Option<i64>,
}

/// A batch together with the allocations it pays
#[derive(Debug, Clone, Serialize)]
pub struct BatchWithAllocations {
    pub batch: PaymentBatch,
    pub allocations: Vec<UnifiedAllocation>,
}
