// Test data factories
//
// Property names and PayProp ids carry a UUID suffix so tests sharing a
// store (or a real database) never collide.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use propledger::modules::allocations::models::{
    AllocationSource, AllocationType, NewAllocation, TransactionKey, UnifiedAllocation,
};
use propledger::modules::batches::models::{BatchRequest, BatchType};
use propledger::modules::properties::models::{NewProperty, Property};
use propledger::AppServices;

pub const OWNER_ID: i64 = 10;

pub struct TestDataFactory;

impl TestDataFactory {
    pub fn unique_name(prefix: &str) -> String {
        format!("{} {}", prefix, &Uuid::new_v4().simple().to_string()[..8])
    }

    /// Unit owned by [`OWNER_ID`]
    pub fn property(name: &str, minimum_balance: Decimal) -> NewProperty {
        NewProperty {
            name: name.to_string(),
            payprop_id: None,
            owner_id: Some(OWNER_ID),
            owner_name: Some("Jane Owner".to_string()),
            is_block_property: false,
            block_property_id: None,
            minimum_balance,
        }
    }

    pub fn block(name: &str) -> NewProperty {
        NewProperty {
            is_block_property: true,
            ..Self::property(name, Decimal::ZERO)
        }
    }

    pub fn unit_in_block(name: &str, block_id: i64) -> NewProperty {
        NewProperty {
            block_property_id: Some(block_id),
            ..Self::property(name, Decimal::ZERO)
        }
    }

    pub fn with_payprop_id(mut new: NewProperty, payprop_id: &str) -> NewProperty {
        new.payprop_id = Some(payprop_id.to_string());
        new
    }

    /// Pending manual allocation for `property`, payable to its owner
    pub fn allocation(
        property: &Property,
        allocation_type: AllocationType,
        amount: Decimal,
    ) -> NewAllocation {
        NewAllocation {
            transaction: None,
            allocation_type,
            amount,
            category: None,
            description: Some(format!("{} for {}", allocation_type.as_str(), property.name)),
            property_id: Some(property.id),
            property_name: Some(property.name.clone()),
            beneficiary_id: property.owner_id,
            beneficiary_name: property.owner_name.clone(),
            source: AllocationSource::Manual,
            settled: None,
        }
    }

    pub fn payprop_allocation(
        property: &Property,
        payment_id: &str,
        amount: Decimal,
    ) -> NewAllocation {
        NewAllocation {
            transaction: Some(TransactionKey::PayProp(payment_id.to_string())),
            source: AllocationSource::PayProp,
            ..Self::allocation(property, AllocationType::Owner, amount)
        }
    }

    pub fn owner_batch(allocation_ids: Vec<i64>, payment_date: NaiveDate) -> BatchRequest {
        BatchRequest {
            allocation_ids,
            batch_type: BatchType::OwnerPayment,
            payment_date,
            beneficiary_id: OWNER_ID,
            beneficiary_name: Some("Jane Owner".to_string()),
            notes: None,
            created_by: Some(1),
        }
    }

    /// A `/report/all-payments` row
    pub fn payprop_payment(
        id: &str,
        amount: &str,
        beneficiary_type: &str,
        property_payprop_id: &str,
    ) -> Value {
        json!({
            "id": id,
            "amount": amount,
            "description": format!("Payment {}", id),
            "due_date": "2026-09-01",
            "beneficiary": { "id": "B1", "name": "Payee Ltd", "type": beneficiary_type },
            "category": { "name": "Rent" },
            "incoming_transaction": {
                "id": format!("IT-{}", id),
                "reconciliation_date": "2026-09-01",
                "property": { "id": property_payprop_id }
            }
        })
    }

    pub fn settled_payprop_payment(
        id: &str,
        amount: &str,
        property_payprop_id: &str,
        batch_id: &str,
    ) -> Value {
        let mut payment = Self::payprop_payment(id, amount, "beneficiary", property_payprop_id);
        payment["payment_batch"] = json!({
            "id": batch_id,
            "status": "paid",
            "transfer_date": "2026-09-03"
        });
        payment
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Creates a unit with `minimum_balance` and funds it with an opening balance
pub async fn funded_property(
    services: &AppServices,
    prefix: &str,
    opening: Decimal,
    minimum_balance: Decimal,
) -> Property {
    let property = services
        .properties
        .create_property(TestDataFactory::property(
            &TestDataFactory::unique_name(prefix),
            minimum_balance,
        ))
        .await
        .unwrap();
    if !opening.is_zero() {
        services
            .balances
            .set_opening_balance(property.id, opening, date("2026-01-01"), None, Some(1))
            .await
            .unwrap();
    }
    services.properties.get_property(property.id).await.unwrap()
}

pub async fn pending_allocation(
    services: &Arc<propledger::modules::allocations::AllocationService>,
    property: &Property,
    allocation_type: AllocationType,
    amount: Decimal,
) -> UnifiedAllocation {
    services
        .create_allocation(TestDataFactory::allocation(property, allocation_type, amount))
        .await
        .unwrap()
}
