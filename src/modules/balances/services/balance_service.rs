use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::core::{format_gbp, money, AppError, Result};
use crate::modules::balances::models::{
    BalanceMovement, BalanceSummary, LedgerEntry, LedgerPage, LedgerQuery, LedgerSource,
    UnitContribution,
};
use crate::modules::balances::repositories::LedgerRepository;
use crate::modules::properties::models::{Property, PropertyFilter};
use crate::modules::properties::repositories::PropertyRepository;

/// Both legs of a property-to-property transfer
#[derive(Debug, Clone, serde::Serialize)]
pub struct TransferResult {
    pub transfer_out: LedgerEntry,
    pub transfer_in: LedgerEntry,
}

/// Property account balances and their ledger
pub struct BalanceService {
    ledger: Arc<dyn LedgerRepository>,
    properties: Arc<dyn PropertyRepository>,
}

impl BalanceService {
    pub fn new(ledger: Arc<dyn LedgerRepository>, properties: Arc<dyn PropertyRepository>) -> Self {
        Self { ledger, properties }
    }

    async fn property(&self, id: i64) -> Result<Property> {
        self.properties
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Property {}", id)))
    }

    async fn post_one(&self, movement: BalanceMovement) -> Result<LedgerEntry> {
        let mut entries = self.ledger.apply(std::slice::from_ref(&movement)).await?;
        let entry = entries
            .pop()
            .ok_or_else(|| AppError::internal("Ledger returned no entry"))?;

        info!(
            property_id = entry.property_id,
            entry_type = %entry.entry_type,
            amount = %entry.amount,
            running_balance = %entry.running_balance,
            "Ledger entry posted"
        );
        Ok(entry)
    }

    pub async fn current_balance(&self, property_id: i64) -> Result<Decimal> {
        Ok(self.property(property_id).await?.account_balance)
    }

    pub async fn available_balance(&self, property_id: i64) -> Result<Decimal> {
        Ok(self.property(property_id).await?.available_balance())
    }

    pub async fn can_withdraw(&self, property_id: i64, amount: Decimal) -> Result<bool> {
        Ok(self.available_balance(property_id).await? >= amount)
    }

    pub async fn summary(&self, property_id: i64) -> Result<BalanceSummary> {
        Ok(to_summary(&self.property(property_id).await?))
    }

    pub async fn list_summaries(&self, filter: &PropertyFilter) -> Result<Vec<BalanceSummary>> {
        let properties = self.properties.list(filter).await?;
        Ok(properties.iter().map(to_summary).collect())
    }

    pub async fn deposit(
        &self,
        property_id: i64,
        amount: Decimal,
        description: &str,
        source: LedgerSource,
        created_by: Option<i64>,
    ) -> Result<LedgerEntry> {
        let amount = money::require_positive(amount, "Deposit amount")?;
        let movement = BalanceMovement::deposit(property_id, amount, description, source, today())
            .created_by(created_by);
        self.post_one(movement).await
    }

    pub async fn withdraw(
        &self,
        property_id: i64,
        amount: Decimal,
        description: &str,
        source: LedgerSource,
        created_by: Option<i64>,
    ) -> Result<LedgerEntry> {
        let amount = money::require_positive(amount, "Withdrawal amount")?;
        let movement =
            BalanceMovement::withdrawal(property_id, amount, description, source, today())
                .created_by(created_by);

        self.post_one(movement).await.inspect_err(|e| {
            if matches!(e, AppError::InsufficientBalance(_)) {
                warn!(property_id, amount = %amount, "Withdrawal rejected");
            }
        })
    }

    /// Manual correction; positive credits, negative debits
    pub async fn adjust(
        &self,
        property_id: i64,
        signed_amount: Decimal,
        description: &str,
        notes: Option<String>,
        created_by: Option<i64>,
    ) -> Result<LedgerEntry> {
        let signed_amount = money::require_non_zero(signed_amount, "Adjustment amount")?;
        if description.trim().is_empty() {
            return Err(AppError::validation("Adjustment description is required"));
        }

        let movement = BalanceMovement::adjustment(property_id, signed_amount, description, today())
            .with_notes(notes)
            .created_by(created_by);
        self.post_one(movement).await
    }

    /// Rejected once the property has any ledger entries
    pub async fn set_opening_balance(
        &self,
        property_id: i64,
        amount: Decimal,
        as_of: NaiveDate,
        notes: Option<String>,
        created_by: Option<i64>,
    ) -> Result<LedgerEntry> {
        money::validate_scale(amount, "Opening balance")?;
        self.property(property_id).await?;

        if self.ledger.has_entries(property_id).await? {
            warn!(property_id, "Opening balance rejected: ledger not empty");
            return Err(AppError::conflict(format!(
                "Property {} already has ledger entries; opening balance not allowed",
                property_id
            )));
        }

        let movement = BalanceMovement::opening_balance(property_id, amount, as_of)
            .with_notes(notes)
            .created_by(created_by);
        self.post_one(movement).await
    }

    /// Moves funds between two properties as one atomic pair of entries
    pub async fn transfer(
        &self,
        from_property_id: i64,
        to_property_id: i64,
        amount: Decimal,
        description: Option<&str>,
        created_by: Option<i64>,
    ) -> Result<TransferResult> {
        if from_property_id == to_property_id {
            return Err(AppError::validation(
                "Cannot transfer a balance to the same property",
            ));
        }
        let amount = money::require_positive(amount, "Transfer amount")?;

        let from = self.property(from_property_id).await?;
        let to = self.property(to_property_id).await?;

        let description = description
            .filter(|d| !d.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Transfer from {} to {}", from.name, to.name));

        let movements = BalanceMovement::transfer_pair(
            from_property_id,
            to_property_id,
            amount,
            &description,
            today(),
        )
        .map(|m| m.created_by(created_by));

        let mut entries = self.ledger.apply(&movements).await?.into_iter();
        let (transfer_out, transfer_in) = match (entries.next(), entries.next()) {
            (Some(out), Some(incoming)) => (out, incoming),
            _ => return Err(AppError::internal("Transfer did not post both entries")),
        };

        info!(
            from_property_id,
            to_property_id,
            amount = %format_gbp(amount),
            "Balance transferred"
        );

        Ok(TransferResult {
            transfer_out,
            transfer_in,
        })
    }

    /// Running balance at the end of `date`; zero before the first entry
    pub async fn balance_as_of(&self, property_id: i64, date: NaiveDate) -> Result<Decimal> {
        self.property(property_id).await?;
        Ok(self
            .ledger
            .latest_entry_as_of(property_id, date)
            .await?
            .map(|e| e.running_balance)
            .unwrap_or(Decimal::ZERO))
    }

    pub async fn ledger_history(
        &self,
        property_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        page: i64,
        size: i64,
    ) -> Result<LedgerPage> {
        self.property(property_id).await?;
        let page = page.max(0);
        let size = size.clamp(1, 200);
        let offset = page
            .checked_mul(size)
            .ok_or_else(|| AppError::validation(format!("Page {} is out of range", page)))?;

        let query = LedgerQuery {
            property_id: Some(property_id),
            from,
            to,
            limit: size,
            offset,
            ..LedgerQuery::default()
        };

        let entries = self.ledger.history(&query).await?;
        let total = self.ledger.count(&query).await?;

        Ok(LedgerPage {
            entries,
            page,
            size,
            total,
        })
    }

    pub async fn owner_ledger(
        &self,
        owner_id: i64,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<LedgerEntry>> {
        let query = LedgerQuery {
            owner_id: Some(owner_id),
            from,
            to,
            limit: 1000,
            ..LedgerQuery::default()
        };
        self.ledger.history(&query).await
    }

    pub async fn entries_for_batch(&self, batch_id: &str) -> Result<Vec<LedgerEntry>> {
        let query = LedgerQuery {
            payment_batch_id: Some(batch_id.to_string()),
            limit: 1000,
            ..LedgerQuery::default()
        };
        self.ledger.history(&query).await
    }

    pub async fn unit_contributions(
        &self,
        block_property_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<UnitContribution>> {
        let block = self.property(block_property_id).await?;
        if !block.is_block_property {
            return Err(AppError::validation(format!(
                "Property {} is not a block property",
                block_property_id
            )));
        }
        if to < from {
            return Err(AppError::validation("Date range end is before its start"));
        }

        self.ledger
            .unit_contributions(block_property_id, from, to)
            .await
    }

    /// Resets the cached balance from the latest ledger entry
    pub async fn recalculate_balance(&self, property_id: i64) -> Result<Decimal> {
        let property = self.property(property_id).await?;
        let balance = self
            .ledger
            .latest_entry(property_id)
            .await?
            .map(|e| e.running_balance)
            .unwrap_or(Decimal::ZERO);

        if balance != property.account_balance {
            warn!(
                property_id,
                cached = %property.account_balance,
                ledger = %balance,
                "Cached balance drifted from ledger"
            );
            self.properties
                .set_account_balance(property_id, balance)
                .await?;
        }

        Ok(balance)
    }

    pub async fn total_balance_for_owner(&self, owner_id: i64) -> Result<Decimal> {
        self.properties.total_balance_for_owner(owner_id).await
    }
}

fn to_summary(property: &Property) -> BalanceSummary {
    BalanceSummary {
        property_id: property.id,
        property_name: property.name.clone(),
        current_balance: property.account_balance,
        available_balance: property.available_balance(),
        minimum_balance: property.minimum_balance,
        is_block_property: property.is_block_property,
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
