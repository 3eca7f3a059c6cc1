use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::orders::{PaymentStatus, ReconcileOutcome};
use crate::AppState;

/// Header carrying the shared webhook token.
pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// Payment notification as delivered by the gateway.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "event": "payment.succeeded",
    "data": {
        "id": "py-1402feb0-bb79-47ae-9d1e-e69394d3949c",
        "amount": 11000,
        "payment_request_id": "pr-5e3d1f3c",
        "reference_id": "550e8400-e29b-41d4-a716-446655440000",
        "status": "SUCCEEDED"
    }
}))]
pub struct PaymentWebhookPayload {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Option<PaymentWebhookData>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct PaymentWebhookData {
    #[serde(default)]
    pub id: Option<String>,
    /// Amount paid in the smallest currency unit
    #[serde(default)]
    #[schema(value_type = Option<i64>)]
    pub amount: Option<serde_json::Number>,
    #[serde(default)]
    pub payment_request_id: Option<String>,
    /// Order id the payment request was tagged with
    #[serde(default)]
    pub reference_id: Option<String>,
    /// SUCCEEDED or FAILED
    #[serde(default)]
    pub status: Option<String>,
}

fn reply_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn reply_ok(message: &str) -> Response {
    (
        StatusCode::OK,
        Json(json!({ "success": true, "message": message })),
    )
        .into_response()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

fn token_matches(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected.filter(|t| !t.is_empty()) else {
        return false;
    };
    headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|presented| constant_time_eq(expected, presented))
        .unwrap_or(false)
}

/// Accepts whole numbers written either as integers or as `11000.0`.
fn amount_in_minor_units(amount: &serde_json::Number) -> Option<i64> {
    if let Some(value) = amount.as_i64() {
        return Some(value);
    }
    amount
        .as_f64()
        .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
        .map(|v| v as i64)
}

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    summary = "Payment gateway callback",
    request_body = PaymentWebhookPayload,
    params(("x-callback-token" = String, Header, description = "Shared webhook token")),
    responses(
        (status = 200, description = "Order updated, already reconciled, or event ignored"),
        (status = 400, description = "Malformed payload or amount mismatch"),
        (status = 401, description = "Missing or wrong callback token"),
        (status = 404, description = "Order not found"),
        (status = 405, description = "Method not allowed"),
        (status = 422, description = "Payment failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !token_matches(state.config.payment_webhook_token.as_deref(), &headers) {
        warn!("Payment webhook rejected: callback token mismatch");
        return reply_error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let payload: PaymentWebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Payment webhook body is not valid JSON");
            return reply_error(StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    if !payload.event.starts_with("payment.") {
        info!(event = %payload.event, "Ignoring non-payment webhook event");
        return reply_ok("Event ignored");
    }

    let data = payload.data.unwrap_or_default();
    let Some(reference_id) = data.reference_id.as_deref().filter(|r| !r.trim().is_empty()) else {
        warn!(payment_id = ?data.id, "Payment webhook without reference_id");
        return reply_error(StatusCode::BAD_REQUEST, "Missing reference_id");
    };
    let Ok(order_id) = Uuid::parse_str(reference_id.trim()) else {
        warn!(%reference_id, "Payment webhook with malformed reference_id");
        return reply_error(StatusCode::BAD_REQUEST, "Invalid reference_id");
    };
    let Some(amount) = data.amount.as_ref().and_then(amount_in_minor_units) else {
        warn!(%order_id, "Payment webhook without a whole amount");
        return reply_error(StatusCode::BAD_REQUEST, "Missing or invalid amount");
    };
    let Some(payment_status) = data.status.as_deref().and_then(PaymentStatus::from_gateway) else {
        warn!(%order_id, status = ?data.status, "Payment webhook with missing or unknown status");
        return reply_error(StatusCode::BAD_REQUEST, "Missing or invalid status");
    };

    info!(
        %order_id,
        amount,
        event = %payload.event,
        payment_request_id = ?data.payment_request_id,
        "Payment webhook received"
    );

    match state
        .services
        .order
        .reconcile_payment(order_id, amount, payment_status)
        .await
    {
        Ok(ReconcileOutcome::Paid(_)) | Ok(ReconcileOutcome::AlreadyPaid(_)) => {
            reply_ok("Order updated successfully")
        }
        Ok(ReconcileOutcome::PaymentFailed(_)) => {
            reply_error(StatusCode::UNPROCESSABLE_ENTITY, "Payment failed")
        }
        Err(ServiceError::NotFound(_)) => reply_error(StatusCode::NOT_FOUND, "Order not found"),
        Err(ServiceError::ValidationError(message)) => {
            reply_error(StatusCode::BAD_REQUEST, &message)
        }
        Err(e) => {
            error!(error = %e, %order_id, "Payment webhook processing failed");
            reply_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Non-POST requests to the webhook path.
pub async fn method_not_allowed() -> Response {
    reply_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn token_must_match_exactly() {
        let mut headers = HeaderMap::new();
        headers.insert(CALLBACK_TOKEN_HEADER, HeaderValue::from_static("secret"));

        assert!(token_matches(Some("secret"), &headers));
        assert!(!token_matches(Some("secret2"), &headers));
        assert!(!token_matches(Some("Secret"), &headers));
        assert!(!token_matches(None, &headers));
        assert!(!token_matches(Some(""), &HeaderMap::new()));
    }

    #[test]
    fn amount_accepts_whole_floats_only() {
        let int: serde_json::Number = serde_json::from_str("11000").unwrap();
        let whole: serde_json::Number = serde_json::from_str("11000.0").unwrap();
        let fractional: serde_json::Number = serde_json::from_str("11000.5").unwrap();

        assert_eq!(amount_in_minor_units(&int), Some(11_000));
        assert_eq!(amount_in_minor_units(&whole), Some(11_000));
        assert_eq!(amount_in_minor_units(&fractional), None);
    }
}
