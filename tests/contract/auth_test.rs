// API key authentication and role checks across the HTTP surface

#[path = "../helpers/mod.rs"]
mod helpers;

use actix_web::http::StatusCode;
use actix_web::test;
use rust_decimal::Decimal;
use serde_json::json;

use helpers::*;

#[actix_web::test]
async fn test_probes_are_public() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(body["status"], "healthy");

    let req = test::TestRequest::get().uri("/").to_request();
    let body = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(body["service"], "propledger");
}

#[actix_web::test]
async fn test_missing_or_unknown_key_is_unauthorized() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = test::TestRequest::get().uri("/api/payment-batches").to_request();
    let message = assert_error(test::call_service(&app, req).await, StatusCode::UNAUTHORIZED).await;
    assert!(message.contains("X-API-Key"));

    let req = test::TestRequest::get()
        .uri("/api/payment-batches")
        .insert_header(("X-API-Key", "pl_not_a_key"))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::UNAUTHORIZED).await;

    let req = test::TestRequest::get()
        .uri("/api/property-balances")
        .insert_header(("X-API-Key", ""))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::UNAUTHORIZED).await;
}

#[actix_web::test]
async fn test_employee_cannot_move_money() {
    let ctx = TestContext::new();
    let flat = funded_property(&ctx.services, "Flat", Decimal::ZERO, Decimal::ZERO).await;
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/payment-batches/create")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .set_json(json!({
            "allocation_ids": [1],
            "batch_type": "OWNER_PAYMENT",
            "payment_date": "2026-09-30",
            "beneficiary_id": OWNER_ID
        }))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/property-balances/{}/opening-balance", flat.id))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .set_json(json!({ "amount": "100", "as_of_date": "2026-01-01" }))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;

    let req = test::TestRequest::post()
        .uri("/api/historical-transactions/import")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .set_payload("transaction_date,amount\n")
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;

    let req = test::TestRequest::post()
        .uri("/api/payprop/sync/payments")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;
}

#[actix_web::test]
async fn test_owner_key_cannot_use_staff_endpoints() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    for uri in [
        "/api/payment-batches/pending",
        "/api/property-balances",
        "/api/properties",
        "/api/allocations",
        "/api/payprop/sync",
    ] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(("X-API-Key", OWNER_KEY))
            .to_request();
        assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;
    }
}

#[actix_web::test]
async fn test_staff_property_workflow_over_http() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/properties")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({
            "name": "14 Harbour Street",
            "owner_id": OWNER_ID,
            "owner_name": "Jane Owner",
            "minimum_balance": "150.00"
        }))
        .to_request();
    let property = assert_json(test::call_service(&app, req).await, StatusCode::CREATED).await;
    assert_eq!(property["occupancy_status"], "OCCUPIED");
    let id = property["id"].as_i64().unwrap();

    // Employees run the occupancy workflow
    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/notice-given", id))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .set_json(json!({
            "notice_date": "2026-10-01",
            "expected_vacancy_date": "2026-10-31"
        }))
        .to_request();
    let updated = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(updated["occupancy_status"], "NOTICE_GIVEN");

    let req = test::TestRequest::post()
        .uri(&format!("/api/properties/{}/notice-given", id))
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .set_json(json!({
            "notice_date": "2026-10-01",
            "expected_vacancy_date": "2026-10-31"
        }))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::BAD_REQUEST).await;
}

#[actix_web::test]
async fn test_sync_without_token_reports_configuration_error() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/api/payprop/sync/payments")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .to_request();
    assert_error(
        test::call_service(&app, req).await,
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .await;
}

#[actix_web::test]
async fn test_email_templates_are_per_user() {
    let ctx = TestContext::new();
    let app = test_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/employee/email-templates")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({ "name": "Welcome", "content": "<p>Welcome</p>" }))
        .to_request();
    let template = assert_json(test::call_service(&app, req).await, StatusCode::CREATED).await;
    let template_id = template["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri("/employee/email-templates/settings/lead/meeting")
        .insert_header(("X-API-Key", EMPLOYEE_KEY))
        .set_json(json!({ "enabled": true, "template_id": template_id }))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::FORBIDDEN).await;

    let req = test::TestRequest::put()
        .uri("/employee/email-templates/settings/lead/meeting")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .set_json(json!({ "enabled": true, "template_id": template_id }))
        .to_request();
    let settings = assert_json(test::call_service(&app, req).await, StatusCode::OK).await;
    assert_eq!(settings["kind"], "LEAD");
    assert_eq!(settings["triggers"]["meeting"]["enabled"], true);

    let req = test::TestRequest::get()
        .uri("/employee/email-templates/settings/invoice")
        .insert_header(("X-API-Key", MANAGER_KEY))
        .to_request();
    assert_error(test::call_service(&app, req).await, StatusCode::BAD_REQUEST).await;

    let req = test::TestRequest::delete()
        .uri(&format!("/employee/email-templates/{}", template_id))
        .insert_header(("X-API-Key", MANAGER_KEY))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NO_CONTENT
    );
}
