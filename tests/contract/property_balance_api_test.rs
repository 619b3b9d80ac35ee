// HTTP contract for /api/property-balances

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::http::StatusCode;
use actix_web::test;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use helpers::*;
use propledger::modules::properties::PropertyRepository;

#[actix_web::test]
async fn test_get_balance_summary() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", dec!(500), dec!(200)).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!("/api/property-balances/{}", flat.id))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;

    assert_eq!(body["property_id"], flat.id);
    assert_decimal(&body["current_balance"], "500");
    assert_decimal(&body["available_balance"], "300");
    assert_decimal(&body["minimum_balance"], "200");

    let req = test::TestRequest::get()
        .uri("/api/property-balances/9999")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::NOT_FOUND).await;
}

#[actix_web::test]
async fn test_debit_adjustment_is_negated() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", dec!(500), Decimal::ZERO).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/property-balances/{}/adjust", flat.id))
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({
            "amount": "75.25",
            "adjustment_type": "debit",
            "description": "Bank charge correction"
        }))
        .to_request();
    let entry = assert_json(test::call_service(&app, req).await, StatusCode::CREATED).await;

    assert_eq!(entry["entry_type"], "ADJUSTMENT");
    assert_decimal(&entry["amount"], "-75.25");
    assert_decimal(&entry["running_balance"], "424.75");
    assert_eq!(
        ctx.services.balances.current_balance(flat.id).await.unwrap(),
        dec!(424.75)
    );
}

#[actix_web::test]
async fn test_adjust_requires_finance_role() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", dec!(500), Decimal::ZERO).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/property-balances/{}/adjust", flat.id))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .set_json(json!({ "amount": "10", "description": "Nope" }))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;
    assert_eq!(ctx.store.ledger_entries(flat.id).len(), 1);
}

#[actix_web::test]
async fn test_opening_balance_conflict() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", Decimal::ZERO, Decimal::ZERO).await;
    let app = test_app!(ctx);

    let opening = |amount: &str| {
        test::TestRequest::post()
            .uri(&format!("/api/property-balances/{}/opening-balance", flat.id))
            .insert_header(("X-API-Key", MANAGER_KEY))
            .set_json(json!({ "amount": amount, "as_of_date": "2026-01-01" }))
            .to_request()
    };

    let entry = assert_json(test::call_service(&app, opening("900")).await, StatusCode::CREATED).await;
    assert_eq!(entry["entry_type"], "OPENING_BALANCE");

    let message = assert_error(test::call_service(&app, opening("100")).await, StatusCode::CONFLICT).await;
    assert!(!message.is_empty());
}

#[actix_web::test]
async fn test_transfer_and_ledger_paging() {
    let ctx = TestContext::new();
    let from = funded_property(&ctx.services, "From", dec!(300), Decimal::ZERO).await;
    let to = funded_property(&ctx.services, "To", Decimal::ZERO, Decimal::ZERO).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/property-balances/{}/transfer", from.id))
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({ "to_property_id": to.id, "amount": "120" }))
        .to_request();
    let result = assert_json(test::call_service(&app, req).await, StatusCode::CREATED).await;
    assert_eq!(result["transfer_out"]["entry_type"], "TRANSFER_OUT");
    assert_decimal(&result["transfer_out"]["running_balance"], "180");
    assert_eq!(result["transfer_in"]["entry_type"], "TRANSFER_IN");
    assert_decimal(&result["transfer_in"]["running_balance"], "120");

    let req = test::TestRequest::get()
        .uri(&format!("/api/property-balances/{}/ledger?page=0&size=1", from.id))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let page = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["entries"].as_array().unwrap().len(), 1);
    assert_eq!(page["entries"][0]["entry_type"], "TRANSFER_OUT");

    let req = test::TestRequest::post()
        .uri(&format!("/api/property-balances/{}/transfer", from.id))
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({ "to_property_id": from.id, "amount": "1" }))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::BAD_REQUEST).await;
}

#[actix_web::test]
async fn test_as_of_and_owner_total() {
    let ctx = TestContext::new();
    funded_property(&ctx.services, "Flat A", dec!(300), Decimal::ZERO).await;
    let b = funded_property(&ctx.services, "Flat B", dec!(200), Decimal::ZERO).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!("/api/property-balances/{}/as-of?date=2025-12-31", b.id))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(body["date"], "2025-12-31");
    assert_decimal(&body["balance"], "0");

    let req = test::TestRequest::get()
        .uri(&format!("/api/property-balances/owner/{}/total", OWNER_ID))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(body["owner_id"], OWNER_ID);
    assert_decimal(&body["total_balance"], "500");
}

#[actix_web::test]
async fn test_recalculate_returns_summary() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", dec!(640), Decimal::ZERO).await;
    ctx.repos
        .properties
        .set_account_balance(flat.id, dec!(1))
        .await
        .unwrap();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/property-balances/{}/recalculate", flat.id))
        .insert_header(("X-API-Key", MANAGER_KEY))
        .to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_decimal(&body["current_balance"], "640");
}

#[actix_web::test]
async fn test_ledger_page_out_of_range_is_bad_request() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", dec!(100), Decimal::ZERO).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/property-balances/{}/ledger?page={}&size=20",
            flat.id,
            i64::MAX
        ))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let message = assert_error(test::call_service(&app, req).await, StatusCode::BAD_REQUEST).await;
    assert!(message.contains("out of range"));
}

#[actix_web::test]
async fn test_adjustment_beyond_column_range_is_bad_request() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", dec!(500), Decimal::ZERO).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!("/api/property-balances/{}/adjust", flat.id))
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({
            "amount": "10000000000000",
            "adjustment_type": "credit",
            "description": "Mistyped amount"
        }))
        .to_request();
    let message = assert_error(test::call_service(&app, req).await, StatusCode::BAD_REQUEST).await;
    assert!(message.contains("out of range"));
    assert_eq!(
        ctx.services.balances.current_balance(flat.id).await.unwrap(),
        dec!(500)
    );
}
