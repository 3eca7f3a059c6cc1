//! Client for the QR payment gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Payment request handed out by the gateway for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub id: String,
    pub payment_method: PaymentMethodHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodHandle {
    pub id: String,
    /// Payload the customer scans; absent if the gateway did not render a QR code.
    pub qr_string: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Requests a one-time QR payment of `amount`, tagged with `reference_id`.
    async fn create_payment_request(
        &self,
        amount: i64,
        reference_id: Uuid,
    ) -> Result<PaymentRequest, ServiceError>;

    /// Sandbox aid: asks the gateway to pay `amount` through `payment_method_id`.
    async fn simulate_payment(
        &self,
        payment_method_id: &str,
        amount: i64,
    ) -> Result<(), ServiceError>;
}

#[derive(Debug, Serialize)]
struct CreatePaymentRequestBody<'a> {
    reference_id: String,
    amount: i64,
    currency: &'a str,
    payment_method: PaymentMethodSpec,
}

#[derive(Debug, Serialize)]
struct PaymentMethodSpec {
    #[serde(rename = "type")]
    method_type: &'static str,
    reusability: &'static str,
    qr_code: QrCodeSpec,
}

#[derive(Debug, Serialize)]
struct QrCodeSpec {
    channel_code: &'static str,
}

#[derive(Debug, Deserialize)]
struct PaymentRequestResponse {
    id: String,
    payment_method: PaymentMethodResponse,
}

#[derive(Debug, Deserialize)]
struct PaymentMethodResponse {
    id: String,
    #[serde(default)]
    qr_code: Option<QrCodeResponse>,
}

#[derive(Debug, Deserialize)]
struct QrCodeResponse {
    #[serde(default)]
    channel_properties: Option<ChannelProperties>,
}

#[derive(Debug, Deserialize)]
struct ChannelProperties {
    #[serde(default)]
    qr_string: Option<String>,
}

impl From<PaymentRequestResponse> for PaymentRequest {
    fn from(resp: PaymentRequestResponse) -> Self {
        let qr_string = resp
            .payment_method
            .qr_code
            .and_then(|qr| qr.channel_properties)
            .and_then(|props| props.qr_string);

        Self {
            id: resp.id,
            payment_method: PaymentMethodHandle {
                id: resp.payment_method.id,
                qr_string,
            },
        }
    }
}

/// Xendit REST client (payment requests API, QRIS channel).
#[derive(Clone)]
pub struct XenditGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    currency: String,
}

impl XenditGateway {
    pub fn new(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        currency: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            currency: currency.into(),
        })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.secret_key, Some(""))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, %url, "Payment gateway request failed");
                ServiceError::ExternalServiceError(format!("Payment gateway unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %url, %body, "Payment gateway rejected request");
            return Err(ServiceError::ExternalServiceError(format!(
                "Payment gateway responded with {}",
                status
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl PaymentGateway for XenditGateway {
    #[instrument(skip(self))]
    async fn create_payment_request(
        &self,
        amount: i64,
        reference_id: Uuid,
    ) -> Result<PaymentRequest, ServiceError> {
        let body = CreatePaymentRequestBody {
            reference_id: reference_id.to_string(),
            amount,
            currency: &self.currency,
            payment_method: PaymentMethodSpec {
                method_type: "QR_CODE",
                reusability: "ONE_TIME_USE",
                qr_code: QrCodeSpec {
                    channel_code: "QRIS",
                },
            },
        };

        let response = self.post_json("/payment_requests", &body).await?;
        let parsed: PaymentRequestResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Unexpected payment request response");
            ServiceError::ExternalServiceError(format!("Malformed payment gateway response: {}", e))
        })?;

        info!(payment_request_id = %parsed.id, "Payment request created");
        Ok(parsed.into())
    }

    #[instrument(skip(self))]
    async fn simulate_payment(
        &self,
        payment_method_id: &str,
        amount: i64,
    ) -> Result<(), ServiceError> {
        let path = format!("/v2/payment_methods/{}/payments/simulate", payment_method_id);
        self.post_json(&path, &serde_json::json!({ "amount": amount }))
            .await?;
        info!(%payment_method_id, amount, "Simulated payment submitted");
        Ok(())
    }
}
