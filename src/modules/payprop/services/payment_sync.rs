use std::collections::HashMap;
use std::sync::Arc;

use actix_web::ResponseError;
use tracing::{debug, info, warn};

use crate::core::Result;
use crate::modules::allocations::models::{
    AllocationSource, NewAllocation, Settlement, TransactionKey,
};
use crate::modules::allocations::services::AllocationService;
use crate::modules::payprop::models::{BeneficiaryType, PayPropPayment, SyncSummary};
use crate::modules::payprop::services::payprop_client::{PayPropApi, ALL_PAYMENTS_ENDPOINT};
use crate::modules::properties::models::Property;
use crate::modules::properties::repositories::PropertyRepository;

/// Pulls `/report/all-payments` and records each payment as an allocation.
///
/// Re-running is safe: allocations are keyed by PayProp payment id and
/// beneficiary, so payments seen before are counted, not duplicated.
pub struct PaymentSyncJob {
    api: Arc<dyn PayPropApi>,
    allocations: Arc<AllocationService>,
    properties: Arc<dyn PropertyRepository>,
}

impl PaymentSyncJob {
    pub fn new(
        api: Arc<dyn PayPropApi>,
        allocations: Arc<AllocationService>,
        properties: Arc<dyn PropertyRepository>,
    ) -> Self {
        Self {
            api,
            allocations,
            properties,
        }
    }

    pub async fn run(&self) -> Result<SyncSummary> {
        let params = [
            ("filter_by", "reconciliation_date".to_string()),
            ("include_beneficiary_info", "true".to_string()),
        ];
        let raw = self.api.fetch_all(ALL_PAYMENTS_ENDPOINT, &params).await?;

        let mut summary = SyncSummary {
            fetched: raw.len(),
            ..SyncSummary::default()
        };
        let mut properties: HashMap<String, Option<Property>> = HashMap::new();

        for value in raw {
            let payment: PayPropPayment = match serde_json::from_value(value) {
                Ok(payment) => payment,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed PayProp payment");
                    summary.skipped_invalid += 1;
                    continue;
                }
            };

            let Some(payprop_property_id) = payment.property_payprop_id().map(str::to_string)
            else {
                summary.skipped_unknown_property += 1;
                continue;
            };
            let property = match properties.get(&payprop_property_id) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self
                        .properties
                        .find_by_payprop_id(&payprop_property_id)
                        .await?;
                    properties.insert(payprop_property_id.clone(), found.clone());
                    found
                }
            };
            let Some(property) = property else {
                debug!(payment_id = %payment.id, property = %payprop_property_id, "Unknown PayProp property");
                summary.skipped_unknown_property += 1;
                continue;
            };

            let new = match Self::to_allocation(&payment, &property) {
                Some(new) => new,
                None => {
                    summary.skipped_invalid += 1;
                    continue;
                }
            };
            let settled = new.settled.is_some();

            match self.allocations.record_allocation(new).await {
                Ok(recorded) if recorded.is_created() => {
                    summary.created += 1;
                    if settled {
                        summary.settled += 1;
                    }
                }
                Ok(_) => summary.already_recorded += 1,
                Err(e) if e.status_code().is_client_error() => {
                    warn!(payment_id = %payment.id, error = %e, "PayProp payment rejected");
                    summary.skipped_invalid += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            fetched = summary.fetched,
            created = summary.created,
            already_recorded = summary.already_recorded,
            skipped_unknown_property = summary.skipped_unknown_property,
            skipped_invalid = summary.skipped_invalid,
            "PayProp payment sync finished"
        );
        Ok(summary)
    }

    fn to_allocation(payment: &PayPropPayment, property: &Property) -> Option<NewAllocation> {
        if payment.amount.is_zero() {
            return None;
        }
        let beneficiary_type = payment.beneficiary_type();
        let payee_name = payment.beneficiary.as_ref().and_then(|b| b.name.clone());

        // Agency and contractor payments are deductions from the owner's payout
        let beneficiary_name = property.owner_name.clone().or_else(|| match beneficiary_type {
            BeneficiaryType::Beneficiary => payee_name.clone(),
            _ => None,
        });
        let description = payment.description.clone().or_else(|| payment.reference.clone());
        let description = match beneficiary_type {
            BeneficiaryType::Beneficiary => description,
            _ => match (description, payee_name) {
                (Some(text), Some(payee)) => Some(format!("{} ({})", text, payee)),
                (text, payee) => text.or(payee),
            },
        };

        Some(NewAllocation {
            transaction: Some(TransactionKey::PayProp(payment.id.clone())),
            allocation_type: beneficiary_type.allocation_type(),
            amount: payment.amount,
            category: payment.category.as_ref().and_then(|c| c.name.clone()),
            description,
            property_id: Some(property.id),
            property_name: Some(property.name.clone()),
            beneficiary_id: property.owner_id,
            beneficiary_name,
            source: AllocationSource::PayProp,
            settled: payment
                .settlement()
                .map(|(batch_reference, paid_date)| Settlement {
                    batch_reference,
                    paid_date,
                }),
        })
    }
}
