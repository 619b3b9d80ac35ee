use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::{AppError, Result};
use crate::modules::allocations::models::{
    AllocationFilter, AllocationSource, AllocationType, NewAllocation, PaymentStatus,
    PendingTotals, TransactionKey, UnifiedAllocation,
};
use crate::modules::allocations::repositories::AllocationRepository;
use crate::modules::properties::repositories::PropertyRepository;
use crate::modules::transactions::repositories::HistoricalTransactionRepository;

/// Beneficiary an allocation is paid to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beneficiary {
    pub id: i64,
    pub name: Option<String>,
}

/// Outcome of an idempotent allocation insert
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Created(UnifiedAllocation),
    Existing(UnifiedAllocation),
}

impl Recorded {
    pub fn is_created(&self) -> bool {
        matches!(self, Recorded::Created(_))
    }

    pub fn into_inner(self) -> UnifiedAllocation {
        match self {
            Recorded::Created(a) | Recorded::Existing(a) => a,
        }
    }
}

pub struct AllocationService {
    allocations: Arc<dyn AllocationRepository>,
    properties: Arc<dyn PropertyRepository>,
    transactions: Arc<dyn HistoricalTransactionRepository>,
}

impl AllocationService {
    pub fn new(
        allocations: Arc<dyn AllocationRepository>,
        properties: Arc<dyn PropertyRepository>,
        transactions: Arc<dyn HistoricalTransactionRepository>,
    ) -> Self {
        Self {
            allocations,
            properties,
            transactions,
        }
    }

    /// Creates an allocation, or returns the one already recorded for the same
    /// transaction and beneficiary
    pub async fn create_allocation(&self, new: NewAllocation) -> Result<UnifiedAllocation> {
        self.record_allocation(new).await.map(Recorded::into_inner)
    }

    pub async fn record_allocation(&self, new: NewAllocation) -> Result<Recorded> {
        let mut new = new.normalized()?;

        if let Some(ref key) = new.transaction {
            if let Some(existing) = self
                .allocations
                .find_by_transaction(key, new.beneficiary_id)
                .await?
            {
                debug!(
                    allocation_id = existing.id,
                    transaction = ?key,
                    "Allocation already exists for transaction and beneficiary"
                );
                return Ok(Recorded::Existing(existing));
            }
        }

        if let (Some(property_id), None) = (new.property_id, new.property_name.as_ref()) {
            let property = self
                .properties
                .find_by_id(property_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Property {}", property_id)))?;
            new.property_name = Some(property.name);
        }

        let status = new.initial_status();
        match self.allocations.insert(&new, status).await {
            Ok(allocation) => {
                info!(
                    allocation_id = allocation.id,
                    allocation_type = %allocation.allocation_type,
                    amount = %allocation.amount,
                    beneficiary_id = ?allocation.beneficiary_id,
                    status = %allocation.payment_status,
                    "Allocation created"
                );
                Ok(Recorded::Created(allocation))
            }
            Err(e) if e.is_unique_violation() => {
                // Lost an insert race; the winner's row is the answer
                let key = new
                    .transaction
                    .as_ref()
                    .ok_or_else(|| AppError::conflict("Duplicate allocation"))?;
                warn!(transaction = ?key, "Concurrent allocation insert, re-reading");
                self.allocations
                    .find_by_transaction(key, new.beneficiary_id)
                    .await?
                    .map(Recorded::Existing)
                    .ok_or_else(|| AppError::conflict("Duplicate allocation"))
            }
            Err(e) => Err(e),
        }
    }

    /// Allocation entered by hand, optionally against a transaction
    pub async fn create_manual(&self, mut new: NewAllocation) -> Result<UnifiedAllocation> {
        new.source = AllocationSource::Manual;
        new.settled = None;
        self.create_allocation(new).await
    }

    /// Allocates a historical transaction to a beneficiary
    pub async fn create_from_transaction(
        &self,
        transaction_id: i64,
        beneficiary: Beneficiary,
        allocation_type: AllocationType,
    ) -> Result<UnifiedAllocation> {
        let transaction = self
            .transactions
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Historical transaction {}", transaction_id))
            })?;

        let new = NewAllocation {
            transaction: Some(TransactionKey::Historical(transaction.id)),
            allocation_type,
            amount: transaction.amount,
            category: transaction.category,
            description: Some(transaction.description),
            property_id: transaction.property_id,
            property_name: None,
            beneficiary_id: Some(beneficiary.id),
            beneficiary_name: beneficiary.name,
            source: AllocationSource::Auto,
            settled: None,
        };
        self.create_allocation(new).await
    }

    pub async fn get(&self, id: i64) -> Result<UnifiedAllocation> {
        self.allocations
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Allocation {}", id)))
    }

    pub async fn list(&self, filter: &AllocationFilter) -> Result<Vec<UnifiedAllocation>> {
        self.allocations.list(filter).await
    }

    pub async fn pending_for_property(&self, property_id: i64) -> Result<Vec<UnifiedAllocation>> {
        let filter = AllocationFilter {
            property_id: Some(property_id),
            ..AllocationFilter::pending()
        };
        self.allocations.list(&filter).await
    }

    pub async fn pending_for_beneficiary(
        &self,
        beneficiary_id: i64,
    ) -> Result<Vec<UnifiedAllocation>> {
        let filter = AllocationFilter {
            beneficiary_id: Some(beneficiary_id),
            ..AllocationFilter::pending()
        };
        self.allocations.list(&filter).await
    }

    pub async fn pending_owner_allocations(&self) -> Result<Vec<UnifiedAllocation>> {
        let filter = AllocationFilter {
            allocation_type: Some(AllocationType::Owner),
            ..AllocationFilter::pending()
        };
        self.allocations.list(&filter).await
    }

    pub async fn allocations_for_batch(&self, batch_id: &str) -> Result<Vec<UnifiedAllocation>> {
        let filter = AllocationFilter {
            payment_batch_id: Some(batch_id.to_string()),
            limit: i64::from(u16::MAX),
            ..AllocationFilter::default()
        };
        self.allocations.list(&filter).await
    }

    /// Income, deductions and net of the pending allocations matching `filter`
    pub async fn pending_totals(&self, filter: &AllocationFilter) -> Result<PendingTotals> {
        let filter = AllocationFilter {
            payment_status: Some(PaymentStatus::Pending),
            ..filter.clone()
        };
        self.allocations.totals(&filter).await
    }
}
