use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::services::orders::{
    CreateOrderRequest, CreateOrderResponse, OrderDetails, OrderResponse, OrderStatusFilter,
    OrderSummary, PaymentRequestResponse,
};
use crate::{errors::ServiceError, ApiResponse, AppState};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListOrdersQuery {
    /// ALL, AWAITING_PAYMENT, PROCESSING or DONE
    #[serde(default)]
    pub status: OrderStatusFilter,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub order_id: Uuid,
    pub paid: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<Vec<OrderSummary>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid status filter", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<OrderSummary>>>, ServiceError> {
    let orders = state.services.order.list_orders(query.status).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Creates an order from cart lines and requests a QR payment for its grand total",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<CreateOrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 502, description = "Order saved but the payment request failed", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.services.order.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderDetails>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderDetails>>, ServiceError> {
    let details = state.services.order.get_order_details(id).await?;
    Ok(Json(ApiResponse::success(details)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/payment-status",
    summary = "Check payment status",
    description = "Reports whether the order has been paid; unknown orders report unpaid",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Payment status", body = ApiResponse<PaymentStatusResponse>),
    ),
    tag = "Orders"
)]
pub async fn check_payment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentStatusResponse>>, ServiceError> {
    let paid = state.services.order.check_payment_status(id).await?;
    Ok(Json(ApiResponse::success(PaymentStatusResponse {
        order_id: id,
        paid,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/finish",
    summary = "Finish order",
    description = "Moves a paid order from PROCESSING to DONE",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order completed", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order is unpaid or not processing", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn finish_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.order.finish_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/simulate-payment",
    summary = "Simulate payment",
    description = "Sandbox aid: asks the gateway to pay the order's QR code",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 202, description = "Simulation submitted; the gateway reports back through the webhook"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order has no payment method", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn simulate_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.order.simulate_payment(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::<()>::message("Payment simulation submitted")),
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment-request",
    summary = "Retry payment request",
    description = "Issues a new QR payment for an order still awaiting payment",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "New payment request attached", body = ApiResponse<PaymentRequestResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order is not awaiting payment", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn retry_payment_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PaymentRequestResponse>>, ServiceError> {
    let response = state.services.order.retry_payment_request(id).await?;
    Ok(Json(ApiResponse::success(response)))
}
