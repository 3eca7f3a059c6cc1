//! HTTP contract of the gateway client, checked against a mock server.

use std::time::Duration;

use assert_matches::assert_matches;
use pos_api::errors::ServiceError;
use pos_api::services::payment_gateway::{PaymentGateway, XenditGateway};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "xnd_test_key";
// base64("xnd_test_key:")
const BASIC_AUTH: &str = "Basic eG5kX3Rlc3Rfa2V5Og==";

fn gateway(server: &MockServer, timeout: Duration) -> XenditGateway {
    XenditGateway::new(server.uri(), SECRET, "IDR", timeout).expect("gateway client")
}

#[tokio::test]
async fn creates_one_time_qris_payment_request() {
    let server = MockServer::start().await;
    let order_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/payment_requests"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_partial_json(json!({
            "reference_id": order_id.to_string(),
            "amount": 11000,
            "currency": "IDR",
            "payment_method": {
                "type": "QR_CODE",
                "reusability": "ONE_TIME_USE",
                "qr_code": { "channel_code": "QRIS" }
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pr-1",
            "reference_id": order_id.to_string(),
            "status": "REQUIRES_ACTION",
            "payment_method": {
                "id": "pm-1",
                "type": "QR_CODE",
                "qr_code": {
                    "channel_code": "QRIS",
                    "channel_properties": { "qr_string": "00020101021226660014" }
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = gateway(&server, Duration::from_secs(5))
        .create_payment_request(11_000, order_id)
        .await
        .expect("payment request");

    assert_eq!(request.id, "pr-1");
    assert_eq!(request.payment_method.id, "pm-1");
    assert_eq!(
        request.payment_method.qr_string.as_deref(),
        Some("00020101021226660014")
    );
}

#[tokio::test]
async fn gateway_rejection_is_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_requests"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": "API_VALIDATION_ERROR",
            "message": "amount is too small"
        })))
        .mount(&server)
        .await;

    let err = gateway(&server, Duration::from_secs(5))
        .create_payment_request(1, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ExternalServiceError(msg) if msg.contains("400"));
}

#[tokio::test]
async fn malformed_response_is_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = gateway(&server, Duration::from_secs(5))
        .create_payment_request(11_000, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ExternalServiceError(_));
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment_requests"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_json(json!({ "id": "pr-1", "payment_method": { "id": "pm-1" } })),
        )
        .mount(&server)
        .await;

    let err = gateway(&server, Duration::from_millis(200))
        .create_payment_request(11_000, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ExternalServiceError(_));
}

#[tokio::test]
async fn simulate_payment_posts_amount_to_payment_method() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2/payment_methods/pm-1/payments/simulate"))
        .and(header("authorization", BASIC_AUTH))
        .and(body_json(json!({ "amount": 11000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "PENDING",
            "message": "Payment simulation queued"
        })))
        .expect(1)
        .mount(&server)
        .await;

    gateway(&server, Duration::from_secs(5))
        .simulate_payment("pm-1", 11_000)
        .await
        .expect("simulation accepted");
}
