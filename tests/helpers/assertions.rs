// Response assertions for contract tests

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::test;
use serde_json::Value;

/// Asserts the status and returns the JSON body
pub async fn assert_json<B>(response: ServiceResponse<B>, expected: StatusCode) -> Value
where
    B: MessageBody,
{
    let status = response.status();
    let body: Value = test::read_body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {}", body);
    body
}

/// Asserts an error response in the `{"error": {"message", "code"}}` shape
pub async fn assert_error<B>(response: ServiceResponse<B>, expected: StatusCode) -> String
where
    B: MessageBody,
{
    let body = assert_json(response, expected).await;
    assert_eq!(
        body["error"]["code"].as_u64(),
        Some(u64::from(expected.as_u16())),
        "error code mismatch: {}",
        body
    );
    body["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

/// Decimal fields serialize as strings; compares them numerically
pub fn assert_decimal(value: &Value, expected: &str) {
    let actual: rust_decimal::Decimal = match value {
        Value::String(s) => s.parse().unwrap(),
        Value::Number(n) => n.to_string().parse().unwrap(),
        other => panic!("expected a decimal, got {}", other),
    };
    assert_eq!(actual, expected.parse().unwrap(), "decimal mismatch");
}
