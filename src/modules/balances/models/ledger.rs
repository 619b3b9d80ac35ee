// Property balance ledger
//
// Every change to a property's account balance is an append-only ledger row
// carrying the signed amount and the balance after it. The property's cached
// account_balance always equals the running_balance of its latest row.
//
// Movements are posted in batches through `post_movements`, which both the
// MySQL repository (inside a locking transaction) and in-memory stores use,
// so a failed leg rejects the whole batch.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{format_gbp, AppError, Result};
use crate::modules::properties::models::available_balance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
    Adjustment,
    OpeningBalance,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Deposit => "DEPOSIT",
            EntryType::Withdrawal => "WITHDRAWAL",
            EntryType::TransferIn => "TRANSFER_IN",
            EntryType::TransferOut => "TRANSFER_OUT",
            EntryType::Adjustment => "ADJUSTMENT",
            EntryType::OpeningBalance => "OPENING_BALANCE",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(EntryType::Deposit),
            "WITHDRAWAL" => Ok(EntryType::Withdrawal),
            "TRANSFER_IN" => Ok(EntryType::TransferIn),
            "TRANSFER_OUT" => Ok(EntryType::TransferOut),
            "ADJUSTMENT" => Ok(EntryType::Adjustment),
            "OPENING_BALANCE" => Ok(EntryType::OpeningBalance),
            _ => Err(format!("Invalid ledger entry type: {}", s)),
        }
    }
}

/// Where a ledger movement originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerSource {
    PaymentBatch,
    BlockTransfer,
    Manual,
    Import,
    #[serde(rename = "PAYPROP_SYNC")]
    PayPropSync,
    HistoricalRecon,
}

impl LedgerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerSource::PaymentBatch => "PAYMENT_BATCH",
            LedgerSource::BlockTransfer => "BLOCK_TRANSFER",
            LedgerSource::Manual => "MANUAL",
            LedgerSource::Import => "IMPORT",
            LedgerSource::PayPropSync => "PAYPROP_SYNC",
            LedgerSource::HistoricalRecon => "HISTORICAL_RECON",
        }
    }
}

impl std::str::FromStr for LedgerSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PAYMENT_BATCH" => Ok(LedgerSource::PaymentBatch),
            "BLOCK_TRANSFER" => Ok(LedgerSource::BlockTransfer),
            "MANUAL" => Ok(LedgerSource::Manual),
            "IMPORT" => Ok(LedgerSource::Import),
            "PAYPROP_SYNC" => Ok(LedgerSource::PayPropSync),
            "HISTORICAL_RECON" => Ok(LedgerSource::HistoricalRecon),
            _ => Err(format!("Invalid ledger source: {}", s)),
        }
    }
}

/// A persisted ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub property_id: i64,
    pub property_name: String,
    pub owner_id: Option<i64>,
    pub entry_type: EntryType,
    /// Signed: credits positive, debits negative
    pub amount: Decimal,
    pub running_balance: Decimal,
    pub description: String,
    pub notes: Option<String>,
    pub payment_batch_id: Option<String>,
    pub reference: Option<String>,
    pub related_property_id: Option<i64>,
    pub related_property_name: Option<String>,
    pub source: LedgerSource,
    pub entry_date: NaiveDate,
    pub created_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn from_new(entry: NewLedgerEntry, id: i64, created_at: DateTime<Utc>) -> Self {
        LedgerEntry {
            id,
            property_id: entry.property_id,
            property_name: entry.property_name,
            owner_id: entry.owner_id,
            entry_type: entry.entry_type,
            amount: entry.amount,
            running_balance: entry.running_balance,
            description: entry.description,
            notes: entry.notes,
            payment_batch_id: entry.payment_batch_id,
            reference: entry.reference,
            related_property_id: entry.related_property_id,
            related_property_name: entry.related_property_name,
            source: entry.source,
            entry_date: entry.entry_date,
            created_by: entry.created_by,
            created_at,
        }
    }
}

/// A ledger row with its running balance computed, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub property_id: i64,
    pub property_name: String,
    pub owner_id: Option<i64>,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub running_balance: Decimal,
    pub description: String,
    pub notes: Option<String>,
    pub payment_batch_id: Option<String>,
    pub reference: Option<String>,
    pub related_property_id: Option<i64>,
    pub related_property_name: Option<String>,
    pub source: LedgerSource,
    pub entry_date: NaiveDate,
    pub created_by: Option<i64>,
}

/// A requested change to one property's balance
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceMovement {
    pub property_id: i64,
    pub entry_type: EntryType,
    /// Signed delta; for OPENING_BALANCE the absolute starting balance
    pub amount: Decimal,
    pub description: String,
    pub notes: Option<String>,
    pub payment_batch_id: Option<String>,
    pub reference: Option<String>,
    pub related_property_id: Option<i64>,
    pub source: LedgerSource,
    pub entry_date: NaiveDate,
    pub created_by: Option<i64>,
    /// Reject the movement if it would take the property below its available balance
    pub enforce_available: bool,
}

impl BalanceMovement {
    fn new(
        property_id: i64,
        entry_type: EntryType,
        amount: Decimal,
        description: impl Into<String>,
        source: LedgerSource,
        entry_date: NaiveDate,
    ) -> Self {
        Self {
            property_id,
            entry_type,
            amount,
            description: description.into(),
            notes: None,
            payment_batch_id: None,
            reference: None,
            related_property_id: None,
            source,
            entry_date,
            created_by: None,
            enforce_available: false,
        }
    }

    /// Credit of a positive `amount`
    pub fn deposit(
        property_id: i64,
        amount: Decimal,
        description: impl Into<String>,
        source: LedgerSource,
        entry_date: NaiveDate,
    ) -> Self {
        Self::new(
            property_id,
            EntryType::Deposit,
            amount.abs(),
            description,
            source,
            entry_date,
        )
    }

    /// Debit of a positive `amount`, limited to the available balance
    pub fn withdrawal(
        property_id: i64,
        amount: Decimal,
        description: impl Into<String>,
        source: LedgerSource,
        entry_date: NaiveDate,
    ) -> Self {
        let mut movement = Self::new(
            property_id,
            EntryType::Withdrawal,
            -amount.abs(),
            description,
            source,
            entry_date,
        );
        movement.enforce_available = true;
        movement
    }

    /// Manual correction in either direction
    pub fn adjustment(
        property_id: i64,
        signed_amount: Decimal,
        description: impl Into<String>,
        entry_date: NaiveDate,
    ) -> Self {
        Self::new(
            property_id,
            EntryType::Adjustment,
            signed_amount,
            description,
            LedgerSource::Manual,
            entry_date,
        )
    }

    pub fn opening_balance(property_id: i64, amount: Decimal, as_of: NaiveDate) -> Self {
        Self::new(
            property_id,
            EntryType::OpeningBalance,
            amount,
            "Opening balance",
            LedgerSource::Manual,
            as_of,
        )
    }

    /// Debit on `from` and credit on `to`, each naming the other
    pub fn transfer_pair(
        from: i64,
        to: i64,
        amount: Decimal,
        description: &str,
        entry_date: NaiveDate,
    ) -> [Self; 2] {
        let amount = amount.abs();
        let mut out = Self::new(
            from,
            EntryType::TransferOut,
            -amount,
            description,
            LedgerSource::BlockTransfer,
            entry_date,
        );
        out.related_property_id = Some(to);

        let mut incoming = Self::new(
            to,
            EntryType::TransferIn,
            amount,
            description,
            LedgerSource::BlockTransfer,
            entry_date,
        );
        incoming.related_property_id = Some(from);

        [out, incoming]
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes.filter(|n| !n.trim().is_empty());
        self
    }

    pub fn with_batch(mut self, batch_id: &str) -> Self {
        self.payment_batch_id = Some(batch_id.to_string());
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn created_by(mut self, user_id: Option<i64>) -> Self {
        self.created_by = user_id;
        self
    }

    /// Balance after applying this movement to `current`
    pub fn apply_to(&self, current: Decimal, minimum: Decimal) -> Result<Decimal> {
        if self.entry_type == EntryType::OpeningBalance {
            return Ok(self.amount);
        }

        if self.enforce_available && self.amount.is_sign_negative() {
            let available = available_balance(current, minimum);
            if -self.amount > available {
                return Err(AppError::insufficient_balance(format!(
                    "Property {} has {} available, {} requested",
                    self.property_id,
                    format_gbp(available),
                    format_gbp(-self.amount)
                )));
            }
        }

        Ok(current + self.amount)
    }
}

/// Locked view of a property account while movements are posted
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub property_id: i64,
    pub property_name: String,
    pub owner_id: Option<i64>,
    pub balance: Decimal,
    pub minimum_balance: Decimal,
    pub has_entries: bool,
}

/// Computes ledger rows for `movements` in order, updating `accounts` in place.
///
/// All-or-nothing: on error the caller must discard both `accounts` and the
/// returned rows.
pub fn post_movements(
    accounts: &mut BTreeMap<i64, AccountState>,
    movements: &[BalanceMovement],
) -> Result<Vec<NewLedgerEntry>> {
    let mut posted = Vec::with_capacity(movements.len());

    for movement in movements {
        let related_property_name = match movement.related_property_id {
            Some(related_id) => Some(
                accounts
                    .get(&related_id)
                    .map(|a| a.property_name.clone())
                    .ok_or_else(|| AppError::not_found(format!("Property {}", related_id)))?,
            ),
            None => None,
        };

        let account = accounts
            .get_mut(&movement.property_id)
            .ok_or_else(|| AppError::not_found(format!("Property {}", movement.property_id)))?;

        if movement.entry_type == EntryType::OpeningBalance && account.has_entries {
            return Err(AppError::conflict(format!(
                "Property {} already has ledger entries; opening balance not allowed",
                movement.property_id
            )));
        }

        let running_balance = movement.apply_to(account.balance, account.minimum_balance)?;
        account.balance = running_balance;
        account.has_entries = true;

        posted.push(NewLedgerEntry {
            property_id: movement.property_id,
            property_name: account.property_name.clone(),
            owner_id: account.owner_id,
            entry_type: movement.entry_type,
            amount: movement.amount,
            running_balance,
            description: movement.description.clone(),
            notes: movement.notes.clone(),
            payment_batch_id: movement.payment_batch_id.clone(),
            reference: movement.reference.clone(),
            related_property_id: movement.related_property_id,
            related_property_name,
            source: movement.source,
            entry_date: movement.entry_date,
            created_by: movement.created_by,
        });
    }

    Ok(posted)
}

/// Property ids a set of movements must lock, ascending
pub fn touched_property_ids(movements: &[BalanceMovement]) -> Vec<i64> {
    let mut ids: Vec<i64> = movements
        .iter()
        .flat_map(|m| std::iter::once(m.property_id).chain(m.related_property_id))
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Filter for ledger history queries
#[derive(Debug, Clone, Default)]
pub struct LedgerQuery {
    pub property_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub payment_batch_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: i64,
    pub offset: i64,
}

/// Funds a unit has transferred into its block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UnitContribution {
    pub unit_property_id: i64,
    /// Absent when every grouped entry lost its name
    pub unit_property_name: Option<String>,
    pub total: Decimal,
    pub entry_count: i64,
}

/// Balance view of one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub property_id: i64,
    pub property_name: String,
    pub current_balance: Decimal,
    pub available_balance: Decimal,
    pub minimum_balance: Decimal,
    pub is_block_property: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerPage {
    pub entries: Vec<LedgerEntry>,
    pub page: i64,
    pub size: i64,
    pub total: i64,
}
