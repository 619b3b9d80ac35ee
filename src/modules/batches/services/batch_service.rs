use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::core::{format_gbp, money, AppError, Result};
use crate::modules::allocations::models::{
    signed_total, AllocationFilter, PaymentStatus, UnifiedAllocation,
};
use crate::modules::allocations::repositories::AllocationRepository;
use crate::modules::balances::models::{BalanceMovement, LedgerSource};
use crate::modules::batches::models::{
    batch_id_day_prefix, generate_batch_id, AdjustmentSource, BatchRequest, BatchStatus,
    BatchType, BatchWithAllocations, PaidTransition, PaymentBatch,
};
use crate::modules::batches::repositories::BatchRepository;
use crate::modules::batches::services::distribution::{distribute, ShareInput};
use crate::modules::properties::repositories::PropertyRepository;

/// Attempts at claiming a fresh batch id before giving up
const BATCH_ID_ATTEMPTS: usize = 5;

/// Balance adjustment applied to an existing batch
#[derive(Debug, Clone, Deserialize)]
pub struct BatchAdjustment {
    pub amount: Decimal,
    pub source: AdjustmentSource,
    pub notes: Option<String>,
    pub property_id: Option<i64>,
}

pub struct BatchService {
    batches: Arc<dyn BatchRepository>,
    allocations: Arc<dyn AllocationRepository>,
    properties: Arc<dyn PropertyRepository>,
}

impl BatchService {
    pub fn new(
        batches: Arc<dyn BatchRepository>,
        allocations: Arc<dyn AllocationRepository>,
        properties: Arc<dyn PropertyRepository>,
    ) -> Self {
        Self {
            batches,
            allocations,
            properties,
        }
    }

    /// Groups pending allocations into a new DRAFT batch
    pub async fn create_batch(&self, request: BatchRequest) -> Result<BatchWithAllocations> {
        let allocations = self.load_batchable(&request).await?;
        let total = signed_total(&allocations);
        self.insert_batch(&request, total, allocations, |_| Ok(Vec::new()))
            .await
    }

    /// Batch for one allocation, typed by the allocation and paid to its beneficiary
    pub async fn create_single_allocation_batch(
        &self,
        allocation_id: i64,
        payment_date: NaiveDate,
        created_by: Option<i64>,
    ) -> Result<BatchWithAllocations> {
        let allocation = self
            .allocations
            .find_by_id(allocation_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Allocation {}", allocation_id)))?;

        let beneficiary_id = allocation.beneficiary_id.ok_or_else(|| {
            AppError::validation(format!(
                "Allocation {} has no beneficiary to pay",
                allocation_id
            ))
        })?;

        let request = BatchRequest {
            allocation_ids: vec![allocation_id],
            batch_type: BatchType::for_allocation(allocation.allocation_type),
            payment_date,
            beneficiary_id,
            beneficiary_name: allocation.beneficiary_name.clone(),
            notes: allocation.description.clone(),
            created_by,
        };
        self.create_batch(request).await
    }

    /// Batch paying `actual_payment` rather than the allocation total.
    ///
    /// A shortfall is retained by the properties as deposits; a top-up is
    /// withdrawn from their available balances. Either way the split follows
    /// each property's share of the allocations.
    pub async fn create_batch_with_actual_amount(
        &self,
        request: BatchRequest,
        actual_payment: Decimal,
    ) -> Result<BatchWithAllocations> {
        money::validate_scale(actual_payment, "Actual payment amount")?;
        let allocations = self.load_batchable(&request).await?;
        let total = signed_total(&allocations);
        let difference = actual_payment - total;

        if difference.is_zero() {
            return self
                .insert_batch(&request, total, allocations, |_| Ok(Vec::new()))
                .await;
        }

        let weights = property_weights(&allocations);
        if weights.is_empty() {
            return Err(AppError::validation(
                "Allocations carry no property to absorb the payment difference",
            ));
        }

        let mut inputs = Vec::with_capacity(weights.len());
        for (property_id, weight) in weights {
            let cap = if difference.is_sign_positive() {
                let property = self
                    .properties
                    .find_by_id(property_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Property {}", property_id)))?;
                Some(property.available_balance())
            } else {
                None
            };
            inputs.push(ShareInput {
                property_id,
                weight,
                cap,
            });
        }

        let shares = distribute(difference.abs(), &inputs).inspect_err(|e| {
            if matches!(e, AppError::InsufficientBalance(_)) {
                warn!(
                    difference = %difference,
                    "Batch top-up exceeds available property balances"
                );
            }
        })?;

        let today = Utc::now().date_naive();
        let created_by = request.created_by;
        let top_up = difference.is_sign_positive();

        self.insert_batch(&request, total, allocations, move |batch| {
            let mut movements = Vec::new();
            for share in shares.iter().filter(|s| !s.amount.is_zero()) {
                let movement = if top_up {
                    BalanceMovement::withdrawal(
                        share.property_id,
                        share.amount,
                        format!("Owner payment top-up for batch {}", batch.batch_id),
                        LedgerSource::PaymentBatch,
                        today,
                    )
                } else {
                    BalanceMovement::deposit(
                        share.property_id,
                        share.amount,
                        format!("Retained from owner payment batch {}", batch.batch_id),
                        LedgerSource::PaymentBatch,
                        today,
                    )
                };
                movements.push(
                    movement
                        .with_batch(&batch.batch_id)
                        .created_by(created_by),
                );
            }

            batch.apply_adjustment(
                difference,
                AdjustmentSource::OwnerBalance,
                Some(format!(
                    "Actual payment {} against allocations {}",
                    format_gbp(actual_payment),
                    format_gbp(total)
                )),
                None,
            )?;
            Ok(movements)
        })
        .await
    }

    /// Adds the batch's single balance adjustment, moving property funds when
    /// a property is named
    pub async fn add_balance_adjustment(
        &self,
        batch_id: &str,
        adjustment: BatchAdjustment,
        created_by: Option<i64>,
    ) -> Result<PaymentBatch> {
        let mut batch = self.batch(batch_id).await?;
        batch
            .apply_adjustment(
                adjustment.amount,
                adjustment.source,
                adjustment.notes.clone(),
                adjustment.property_id,
            )
            .inspect_err(|e| warn!(batch_id, error = %e, "Batch adjustment rejected"))?;

        let mut movements = Vec::new();
        if let Some(property_id) = adjustment.property_id {
            let description = format!(
                "{} adjustment for batch {}",
                adjustment.source.as_str(),
                batch.batch_id
            );
            let ledger_source = adjustment.source.ledger_source();
            let today = Utc::now().date_naive();
            let movement = if batch.balance_adjustment.is_sign_positive() {
                BalanceMovement::withdrawal(
                    property_id,
                    batch.balance_adjustment,
                    description,
                    ledger_source,
                    today,
                )
            } else {
                BalanceMovement::deposit(
                    property_id,
                    batch.balance_adjustment.abs(),
                    description,
                    ledger_source,
                    today,
                )
            };
            movements.push(
                movement
                    .with_batch(&batch.batch_id)
                    .with_notes(adjustment.notes)
                    .created_by(created_by),
            );
        }

        self.batches.save_adjustment(&batch, &movements).await?;

        info!(
            batch_id = %batch.batch_id,
            adjustment = %batch.balance_adjustment,
            source = batch.adjustment_source.as_str(),
            property_id = ?batch.adjustment_property_id,
            total_payment = %batch.total_payment,
            "Batch balance adjusted"
        );
        Ok(batch)
    }

    pub async fn mark_pending(&self, batch_id: &str) -> Result<PaymentBatch> {
        let mut batch = self.batch(batch_id).await?;
        batch.mark_pending()?;
        self.batches
            .update_status(&batch, BatchStatus::Draft)
            .await?;

        info!(batch_id = %batch.batch_id, "Batch marked pending");
        Ok(batch)
    }

    /// Marks the batch and its allocations paid. Repeating the call with the
    /// same details returns the batch untouched.
    pub async fn mark_paid(
        &self,
        batch_id: &str,
        paid_date: NaiveDate,
        payment_reference: Option<String>,
    ) -> Result<PaymentBatch> {
        let mut batch = self.batch(batch_id).await?;

        match batch.mark_paid(paid_date, payment_reference)? {
            PaidTransition::AlreadyPaid => {
                info!(batch_id = %batch.batch_id, "Batch already paid, nothing to do");
            }
            PaidTransition::Applied { previous } => {
                self.batches.mark_paid(&batch, previous).await?;
                info!(
                    batch_id = %batch.batch_id,
                    paid_date = %paid_date,
                    total_payment = %format_gbp(batch.total_payment),
                    "Batch marked paid"
                );
            }
        }
        Ok(batch)
    }

    pub async fn get_batch_with_allocations(&self, batch_id: &str) -> Result<BatchWithAllocations> {
        let batch = self.batch(batch_id).await?;
        let allocations = self
            .allocations
            .list(&AllocationFilter {
                payment_batch_id: Some(batch.batch_id.clone()),
                limit: i64::from(u16::MAX),
                ..AllocationFilter::default()
            })
            .await?;
        Ok(BatchWithAllocations { batch, allocations })
    }

    /// DRAFT and PENDING batches, oldest payment date first
    pub async fn list_pending(&self, limit: i64, offset: i64) -> Result<Vec<PaymentBatch>> {
        self.batches
            .list_by_status(&[BatchStatus::Draft, BatchStatus::Pending], limit, offset)
            .await
    }

    pub async fn list_by_status(
        &self,
        status: BatchStatus,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PaymentBatch>> {
        self.batches.list_by_status(&[status], limit, offset).await
    }

    async fn batch(&self, batch_id: &str) -> Result<PaymentBatch> {
        self.batches
            .find_by_batch_id(batch_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment batch {}", batch_id)))
    }

    /// Loads and checks the allocations a new batch would claim
    async fn load_batchable(&self, request: &BatchRequest) -> Result<Vec<UnifiedAllocation>> {
        if request.allocation_ids.is_empty() {
            return Err(AppError::validation("At least one allocation is required"));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = request.allocation_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(AppError::validation(format!(
                "Allocation {} is listed more than once",
                duplicate
            )));
        }

        let allocations = self.allocations.find_by_ids(&request.allocation_ids).await?;
        if allocations.len() != request.allocation_ids.len() {
            let found: HashSet<i64> = allocations.iter().map(|a| a.id).collect();
            let missing: Vec<String> = request
                .allocation_ids
                .iter()
                .filter(|id| !found.contains(id))
                .map(i64::to_string)
                .collect();
            return Err(AppError::not_found(format!(
                "Allocations {}",
                missing.join(", ")
            )));
        }

        let not_pending: Vec<String> = allocations
            .iter()
            .filter(|a| !a.is_pending())
            .map(|a| a.id.to_string())
            .collect();
        if !not_pending.is_empty() {
            return Err(AppError::conflict(format!(
                "Allocations {} are not pending",
                not_pending.join(", ")
            )));
        }

        if let Some(other) = allocations
            .iter()
            .find(|a| a.beneficiary_id != Some(request.beneficiary_id))
        {
            return Err(AppError::validation(format!(
                "Allocation {} belongs to beneficiary {:?}, not {}",
                other.id, other.beneficiary_id, request.beneficiary_id
            )));
        }

        Ok(allocations)
    }

    /// Claims a batch id and persists the batch. `prepare` sees the draft with
    /// its final id and returns the ledger movements to post alongside it.
    async fn insert_batch<F>(
        &self,
        request: &BatchRequest,
        total: Decimal,
        mut allocations: Vec<UnifiedAllocation>,
        prepare: F,
    ) -> Result<BatchWithAllocations>
    where
        F: Fn(&mut PaymentBatch) -> Result<Vec<BalanceMovement>>,
    {
        let day_prefix = batch_id_day_prefix(request.batch_type, request.payment_date);

        for attempt in 1..=BATCH_ID_ATTEMPTS {
            let issued = self.batches.count_with_prefix(&day_prefix).await?;
            let sequence = u32::try_from(issued + attempt as i64)
                .map_err(|_| AppError::internal("Batch sequence overflow"))?;
            let batch_id = generate_batch_id(request.batch_type, request.payment_date, sequence);

            let mut draft = PaymentBatch::draft(batch_id, request, total);
            let movements = prepare(&mut draft)?;

            match self
                .batches
                .create_with_allocations(&draft, &request.allocation_ids, &movements)
                .await
            {
                Ok((batch, entries)) => {
                    for allocation in allocations.iter_mut() {
                        allocation.payment_status = PaymentStatus::Batched;
                        allocation.payment_batch_id = Some(batch.batch_id.clone());
                    }
                    info!(
                        batch_id = %batch.batch_id,
                        batch_type = %batch.batch_type,
                        beneficiary_id = batch.beneficiary_id,
                        allocations = allocations.len(),
                        total_allocations = %batch.total_allocations,
                        total_payment = %batch.total_payment,
                        ledger_entries = entries.len(),
                        "Payment batch created"
                    );
                    return Ok(BatchWithAllocations { batch, allocations });
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(attempt, prefix = %day_prefix, "Batch id taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        error!(prefix = %day_prefix, "Could not allocate a batch id");
        Err(AppError::conflict(format!(
            "Could not allocate a batch id for {}",
            day_prefix
        )))
    }
}

/// Allocation magnitude per property, ascending by property id
fn property_weights(allocations: &[UnifiedAllocation]) -> Vec<(i64, Decimal)> {
    let mut weights: BTreeMap<i64, Decimal> = BTreeMap::new();
    for allocation in allocations {
        if let Some(property_id) = allocation.property_id {
            *weights.entry(property_id).or_default() += allocation.amount.abs();
        }
    }
    weights.into_iter().collect()
}
