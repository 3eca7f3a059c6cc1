use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "POS API",
        version = "1.0.0",
        description = r#"
# Point-of-Sale API

Backend for a single-store point of sale.

- **Catalog**: categories and products with prices in the smallest currency unit
- **Checkout**: an order is priced server-side and a QR payment request is opened with the gateway
- **Payments**: the gateway reports back through `POST /api/v1/payments/webhook`
- **Fulfilment**: paid orders are finished by the operator
- **Reporting**: revenue and order counts

## Order status

`AWAITING_PAYMENT` → `PROCESSING` (payment confirmed) → `DONE` (finished).
A failed payment report moves a `PROCESSING` order back to `AWAITING_PAYMENT`.

## Error Handling

Errors share one body:

```json
{
  "error": "Unprocessable Entity",
  "message": "Unprocessable: Order has not been paid yet",
  "request_id": "6f1c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Categories", description = "Product categories"),
        (name = "Products", description = "Product catalog"),
        (name = "Orders", description = "Checkout, order queries and fulfilment"),
        (name = "Payments", description = "Payment gateway callbacks"),
        (name = "Reports", description = "Sales reporting")
    ),
    paths(
        // Categories
        crate::handlers::categories::list_categories,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::check_payment_status,
        crate::handlers::orders::finish_order,
        crate::handlers::orders::simulate_payment,
        crate::handlers::orders::retry_payment_request,

        // Reports
        crate::handlers::reports::sales_report,

        // Webhooks
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::ResponseMeta,

            // Catalog types
            crate::services::categories::CategoryInput,
            crate::services::categories::CategoryResponse,
            crate::services::products::CreateProductRequest,
            crate::services::products::UpdateProductRequest,
            crate::services::products::ProductResponse,
            crate::services::products::CategorySummary,

            // Order types
            crate::entities::order::OrderStatus,
            crate::services::orders::OrderLine,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderResponse,
            crate::services::orders::PaymentRequestResponse,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderSummary,
            crate::services::orders::OrderDetails,
            crate::services::orders::OrderDetailItem,
            crate::services::orders::OrderStatusFilter,
            crate::services::orders::SalesReport,
            crate::services::pricing::OrderTotals,
            crate::handlers::orders::PaymentStatusResponse,

            // Webhook types
            crate::handlers::payment_webhooks::PaymentWebhookPayload,
            crate::handlers::payment_webhooks::PaymentWebhookData,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_pos_routes() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("POS API"));
        assert!(json.contains("/api/v1/orders/{id}/finish"));
        assert!(json.contains("/api/v1/payments/webhook"));
        assert!(json.contains("/api/v1/sales/report"));
    }
}
