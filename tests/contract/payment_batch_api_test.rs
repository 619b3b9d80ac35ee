// HTTP contract for /api/payment-batches and the owner payment views

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::http::StatusCode;
use actix_web::test;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use helpers::*;
use propledger::modules::allocations::models::AllocationType;

#[actix_web::test]
async fn test_create_batch_returns_batch_and_allocations() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;
    let rent = pending_allocation(&s.allocations, &flat, AllocationType::Owner, dec!(800)).await;
    let fee = pending_allocation(&s.allocations, &flat, AllocationType::Commission, dec!(96)).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/payment-batches/create")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({
            "allocation_ids": [rent.id, fee.id],
            "batch_type": "OWNER_PAYMENT",
            "payment_date": "2026-09-30",
            "beneficiary_id": OWNER_ID,
            "beneficiary_name": "Jane Owner"
        }))
        .to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::CREATED).await;

    assert_eq!(body["batch"]["batch_id"], "OWNER-20260930-0001");
    assert_eq!(body["batch"]["status"], "DRAFT");
    assert_eq!(body["batch"]["created_by"], MANAGER_USER_ID);
    assert_decimal(&body["batch"]["total_payment"], "704");
    let allocations = body["allocations"].as_array().unwrap();
    assert_eq!(allocations.len(), 2);
    assert!(allocations.iter().all(|a| a["payment_status"] == "BATCHED"));

    let req = test::TestRequest::get()
        .uri("/api/payment-batches/OWNER-20260930-0001")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let fetched = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(fetched["allocations"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_create_batch_with_actual_amount() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;
    let rent = pending_allocation(&s.allocations, &flat, AllocationType::Owner, dec!(1000)).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/payment-batches/create")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({
            "allocation_ids": [rent.id],
            "batch_type": "OWNER_PAYMENT",
            "payment_date": "2026-09-30",
            "beneficiary_id": OWNER_ID,
            "actual_payment_amount": "900.00"
        }))
        .to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::CREATED).await;

    assert_decimal(&body["batch"]["total_allocations"], "1000");
    assert_decimal(&body["batch"]["total_payment"], "900");
    assert_eq!(body["batch"]["adjustment_source"], "OWNER_BALANCE");
    // The shortfall stays with the property
    assert_eq!(
        ctx.services.balances.current_balance(flat.id).await.unwrap(),
        dec!(100)
    );
}

#[actix_web::test]
async fn test_batch_lifecycle_over_http() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", Decimal::ZERO, Decimal::ZERO).await;
    let fee = pending_allocation(&s.allocations, &flat, AllocationType::Commission, dec!(80)).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri(&format!(
            "/api/payment-batches/create-single/{}?payment_date=2026-09-30",
            fee.id
        ))
        .insert_header(("X-API-Key", MANAGER_KEY))
        .to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::CREATED).await;
    let batch_id = body["batch"]["batch_id"].as_str().unwrap().to_string();
    assert!(batch_id.starts_with("COMM-20260930-"));

    let post = |uri: String, payload: serde_json::Value| {
        test::TestRequest::post()
            .uri(&uri)
            .insert_header(("X-API-Key", MANAGER_KEY))
            .set_json(payload)
            .to_request()
    };

    let adjusted = assert_json(
        test::call_service(
            &app,
            post(
                format!("/api/payment-batches/{}/adjust", batch_id),
                json!({ "amount": "-5", "source": "BLOCK", "notes": "Rounding" }),
            ),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_decimal(&adjusted["total_payment"], "-85");

    let second = test::call_service(
        &app,
        post(
            format!("/api/payment-batches/{}/adjust", batch_id),
            json!({ "amount": "1", "source": "BLOCK" }),
        ),
    )
    .await;
    assert_error(second, StatusCode::CONFLICT).await;

    let pending = assert_json(
        test::call_service(
            &app,
            post(format!("/api/payment-batches/{}/pending", batch_id), json!({})),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(pending["status"], "PENDING");

    let paid_body = json!({ "paid_date": "2026-10-01", "payment_reference": "BACS-77" });
    let paid = assert_json(
        test::call_service(
            &app,
            post(format!("/api/payment-batches/{}/paid", batch_id), paid_body.clone()),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(paid["status"], "PAID");

    // Same details again is a no-op
    let again = test::call_service(
        &app,
        post(format!("/api/payment-batches/{}/paid", batch_id), paid_body),
    )
    .await;
    assert_json(again, StatusCode::OK).await;

    let different = test::call_service(
        &app,
        post(
            format!("/api/payment-batches/{}/paid", batch_id),
            json!({ "paid_date": "2026-10-02" }),
        ),
    )
    .await;
    assert_error(different, StatusCode::CONFLICT).await;

    let req = test::TestRequest::get()
        .uri("/api/payment-batches?status=PAID")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let listed = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_pending_allocation_views() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let a = funded_property(s, "Flat A", Decimal::ZERO, Decimal::ZERO).await;
    let b = funded_property(s, "Flat B", Decimal::ZERO, Decimal::ZERO).await;
    pending_allocation(&s.allocations, &a, AllocationType::Owner, dec!(800)).await;
    pending_allocation(&s.allocations, &a, AllocationType::Expense, dec!(120)).await;
    pending_allocation(&s.allocations, &b, AllocationType::Owner, dec!(400)).await;
    let app = test_app!(ctx);

    let get = |uri: String| {
        test::TestRequest::get()
            .uri(&uri)
            .insert_header(("X-API-Key", EMPLOYEE_KEY))
            .to_request()
    };

    let all = assert_json(
        test::call_service(&app, get("/api/payment-batches/pending-allocations".into())).await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let for_a = assert_json(
        test::call_service(
            &app,
            get(format!("/api/payment-batches/pending-allocations/property/{}", a.id)),
        )
        .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(for_a.as_array().unwrap().len(), 2);

    let totals = assert_json(
        test::call_service(&app, get("/api/payment-batches/pending-total".into())).await,
        StatusCode::OK,
    )
    .await;
    assert_decimal(&totals["income"], "1200");
    assert_decimal(&totals["deductions"], "120");
    assert_decimal(&totals["net"], "1080");
    assert_eq!(totals["count"], 3);
}

#[actix_web::test]
async fn test_bad_requests() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/payment-batches/create")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({
            "allocation_ids": [],
            "batch_type": "OWNER_PAYMENT",
            "payment_date": "2026-09-30",
            "beneficiary_id": OWNER_ID
        }))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::BAD_REQUEST).await;

    let req = test::TestRequest::get()
        .uri("/api/payment-batches/OWNER-20260101-0009")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::NOT_FOUND).await;
}

#[actix_web::test]
async fn test_owner_dashboard_and_self_service() {
    let ctx = TestContext::new();
    let s = &ctx.services;
    let flat = funded_property(s, "Flat", dec!(250), Decimal::ZERO).await;
    pending_allocation(&s.allocations, &flat, AllocationType::Owner, dec!(800)).await;
    pending_allocation(&s.allocations, &flat, AllocationType::Expense, dec!(50)).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::get()
        .uri("/api/owner-payments/dashboard")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    let dashboard = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_decimal(&dashboard["pending"]["net"], "750");
    assert_eq!(dashboard["by_beneficiary"][0]["beneficiary_id"], OWNER_ID);

    let req = test::TestRequest::get()
        .uri("/property-owner/pending-allocations")
        .insert_header(("X-API-Key", OWNER_KEY))
        .to_request();
    let mine = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(mine.as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/property-owner/balances")
        .insert_header(("X-API-Key", OWNER_KEY))
        .to_request();
    let balances = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_decimal(&balances["total_balance"], "250");
    assert_eq!(balances["properties"].as_array().unwrap().len(), 1);

    // Owners cannot see the staff dashboard, staff have no owner view
    let req = test::TestRequest::get()
        .uri("/api/owner-payments/dashboard")
        .insert_header(("X-API-Key", OWNER_KEY))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;

    let req = test::TestRequest::get()
        .uri("/property-owner/balances")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;
}
