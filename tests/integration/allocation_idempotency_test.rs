// Unified allocations: idempotent recording, settlement and pending queries

#[path = "../helpers/mod.rs"]
mod helpers;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use helpers::*;
use propledger::modules::allocations::models::{
    AllocationFilter, AllocationSource, AllocationType, PaymentStatus, Settlement, TransactionKey,
};
use propledger::modules::allocations::services::Beneficiary;
use propledger::modules::transactions::models::{NewHistoricalTransaction, TransactionType};
use propledger::AppError;

#[tokio::test]
async fn test_same_transaction_and_beneficiary_records_once() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let new = TestDataFactory::payprop_allocation(&flat, "PP-100", dec!(800));
    let first = s.allocations.record_allocation(new.clone()).await.unwrap();
    let second = s.allocations.record_allocation(new).await.unwrap();

    assert!(first.is_created());
    assert!(!second.is_created());
    let (first, second) = (first.into_inner(), second.into_inner());
    assert_eq!(first.id, second.id);
    assert_eq!(ctx.store.allocation_count(), 1);
    assert_eq!(first.payprop_payment_id.as_deref(), Some("PP-100"));
    assert_eq!(first.transaction_key(), Some(TransactionKey::PayProp("PP-100".to_string())));
}

#[tokio::test]
async fn test_same_transaction_different_beneficiaries_are_separate() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let owner = TestDataFactory::payprop_allocation(&flat, "PP-200", dec!(800));
    let mut agency = TestDataFactory::payprop_allocation(&flat, "PP-200", dec!(80));
    agency.allocation_type = AllocationType::Commission;
    agency.beneficiary_id = Some(77);
    agency.beneficiary_name = Some("Letting Agency".to_string());

    let a = s.allocations.create_allocation(owner).await.unwrap();
    let b = s.allocations.create_allocation(agency).await.unwrap();
    assert_ne!(a.id, b.id);

    // A payee without an id is a beneficiary of its own
    let mut contractor = TestDataFactory::payprop_allocation(&flat, "PP-200", dec!(45));
    contractor.allocation_type = AllocationType::Expense;
    contractor.beneficiary_id = None;
    let c = s.allocations.record_allocation(contractor.clone()).await.unwrap();
    let c_again = s.allocations.record_allocation(contractor).await.unwrap();
    assert!(c.is_created());
    assert!(!c_again.is_created());

    assert_eq!(ctx.store.allocation_count(), 3);
}

#[tokio::test]
async fn test_amount_is_stored_as_magnitude() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let expense = s
        .allocations
        .create_allocation(TestDataFactory::allocation(
            &flat,
            AllocationType::Expense,
            dec!(-120),
        ))
        .await
        .unwrap();
    assert_eq!(expense.amount, dec!(120));
    assert_eq!(expense.signed_amount(), dec!(-120));

    let zero = s
        .allocations
        .create_allocation(TestDataFactory::allocation(&flat, AllocationType::Owner, Decimal::ZERO))
        .await;
    assert!(matches!(zero, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_non_manual_allocation_requires_transaction() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let mut new = TestDataFactory::allocation(&flat, AllocationType::Owner, dec!(10));
    new.source = AllocationSource::Auto;
    let result = s.allocations.create_allocation(new).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_settled_import_starts_paid() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let mut new = TestDataFactory::payprop_allocation(&flat, "PP-300", dec!(640));
    new.settled = Some(Settlement {
        batch_reference: "PPB-77".to_string(),
        paid_date: date("2026-09-03"),
    });
    let allocation = s.allocations.create_allocation(new).await.unwrap();

    assert_eq!(allocation.payment_status, PaymentStatus::Paid);
    assert_eq!(allocation.payment_batch_id.as_deref(), Some("PPB-77"));
    assert_eq!(allocation.paid_date, Some(date("2026-09-03")));
    assert!(s.allocations.pending_for_property(flat.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_entry_clears_settlement() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let mut new = TestDataFactory::payprop_allocation(&flat, "PP-400", dec!(10));
    new.settled = Some(Settlement {
        batch_reference: "PPB-1".to_string(),
        paid_date: date("2026-09-03"),
    });
    let manual = s.allocations.create_manual(new).await.unwrap();

    assert_eq!(manual.source, AllocationSource::Manual);
    assert_eq!(manual.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_create_from_historical_transaction() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let inserted = ctx
        .repos
        .transactions
        .insert_all(&[NewHistoricalTransaction {
            transaction_date: date("2026-08-01"),
            amount: dec!(950),
            description: "August rent".to_string(),
            transaction_type: TransactionType::Payment,
            category: Some("Rent".to_string()),
            property_id: Some(flat.id),
            property_reference: Some(flat.name.clone()),
            customer_reference: None,
            bank_reference: None,
            payment_method: None,
            notes: None,
            import_batch_id: None,
        }])
        .await
        .unwrap();
    let transaction = &inserted[0];

    let beneficiary = Beneficiary {
        id: OWNER_ID,
        name: Some("Jane Owner".to_string()),
    };
    let allocation = s
        .allocations
        .create_from_transaction(transaction.id, beneficiary.clone(), AllocationType::Owner)
        .await
        .unwrap();

    assert_eq!(allocation.transaction_id, Some(transaction.id));
    assert_eq!(allocation.source, AllocationSource::Auto);
    assert_eq!(allocation.amount, dec!(950));
    assert_eq!(allocation.property_name.as_deref(), Some(flat.name.as_str()));

    let again = s
        .allocations
        .create_from_transaction(transaction.id, beneficiary, AllocationType::Owner)
        .await
        .unwrap();
    assert_eq!(again.id, allocation.id);

    let missing = s
        .allocations
        .create_from_transaction(
            9_999,
            Beneficiary {
                id: OWNER_ID,
                name: None,
            },
            AllocationType::Owner,
        )
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_pending_queries_and_totals() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let a = funded_property(s, "Flat A", Decimal::ZERO, Decimal::ZERO).await;
    let b = funded_property(s, "Flat B", Decimal::ZERO, Decimal::ZERO).await;

    pending_allocation(&s.allocations, &a, AllocationType::Owner, dec!(800)).await;
    pending_allocation(&s.allocations, &a, AllocationType::Commission, dec!(80)).await;
    let paid_later = pending_allocation(&s.allocations, &b, AllocationType::Owner, dec!(500)).await;
    pending_allocation(&s.allocations, &b, AllocationType::Expense, dec!(120)).await;

    s.batches
        .create_batch(TestDataFactory::owner_batch(vec![paid_later.id], date("2026-09-30")))
        .await
        .unwrap();

    assert_eq!(s.allocations.pending_for_property(a.id).await.unwrap().len(), 2);
    assert_eq!(s.allocations.pending_for_property(b.id).await.unwrap().len(), 1);
    assert_eq!(s.allocations.pending_for_beneficiary(OWNER_ID).await.unwrap().len(), 3);
    assert_eq!(s.allocations.pending_owner_allocations().await.unwrap().len(), 1);

    let totals = s
        .allocations
        .pending_totals(&AllocationFilter::pending())
        .await
        .unwrap();
    assert_eq!(totals.income, dec!(800));
    assert_eq!(totals.deductions, dec!(200));
    assert_eq!(totals.net, dec!(600));
    assert_eq!(totals.count, 3);

    let batched = s
        .allocations
        .list(&AllocationFilter {
            payment_status: Some(PaymentStatus::Batched),
            limit: 50,
            ..AllocationFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(batched.len(), 1);
    assert_eq!(batched[0].id, paid_later.id);
}

#[tokio::test]
async fn test_lost_insert_race_returns_existing_allocation() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    let new = TestDataFactory::payprop_allocation(&flat, "PP-300", dec!(640));
    let winner = s.allocations.create_allocation(new.clone()).await.unwrap();

    // The pre-insert lookup misses, so the insert hits the unique key
    ctx.store.hide_allocation_lookups(1);
    let loser = s.allocations.record_allocation(new).await.unwrap();

    assert!(!loser.is_created());
    assert_eq!(loser.into_inner().id, winner.id);
    assert_eq!(ctx.store.allocation_count(), 1);
}

#[tokio::test]
async fn test_pending_totals_cover_rows_beyond_the_page() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;

    for amount in [dec!(700), dec!(650), dec!(600)] {
        pending_allocation(&s.allocations, &flat, AllocationType::Owner, amount).await;
    }
    pending_allocation(&s.allocations, &flat, AllocationType::Expense, dec!(90)).await;

    let totals = s
        .allocations
        .pending_totals(&AllocationFilter {
            property_id: Some(flat.id),
            limit: 1,
            offset: 2,
            ..AllocationFilter::default()
        })
        .await
        .unwrap();

    assert_eq!(totals.count, 4);
    assert_eq!(totals.income, dec!(1950));
    assert_eq!(totals.deductions, dec!(90));
    assert_eq!(totals.net, dec!(1860));
}
