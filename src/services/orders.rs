use crate::{
    config::AppConfig,
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::Cart,
    services::payment_gateway::{PaymentGateway, PaymentRequest},
    services::pricing::{self, DEFAULT_TAX_RATE_PERCENT},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One requested line of a new order.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLine {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub subtotal: i64,
    pub tax: i64,
    pub grandtotal: i64,
    pub status: OrderStatus,
    pub external_transaction_id: Option<String>,
    pub payment_method_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderResponse {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            subtotal: model.subtotal,
            tax: model.tax,
            grandtotal: model.grandtotal,
            status: model.status,
            external_transaction_id: model.external_transaction_id,
            payment_method_id: model.payment_method_id,
            paid_at: model.paid_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub price: i64,
    pub quantity: i32,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            price: model.price,
            quantity: model.quantity,
        }
    }
}

/// Result of a checkout: the order, its lines and the QR payload to scan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
    pub qr_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRequestResponse {
    pub order: OrderResponse,
    pub qr_string: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub grandtotal: i64,
    pub status: OrderStatus,
    pub paid_at: Option<DateTime<Utc>>,
    /// Number of order lines
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetailItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub price: i64,
    pub quantity: i32,
    pub subtotal: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: OrderResponse,
    pub items: Vec<OrderDetailItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SalesReport {
    /// Sum of grandtotal over orders with a payment timestamp
    pub total_revenue: i64,
    /// Orders not yet done
    pub total_ongoing_orders: u64,
    pub total_completed_orders: u64,
}

/// Status filter for order listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatusFilter {
    #[default]
    All,
    AwaitingPayment,
    Processing,
    Done,
}

impl OrderStatusFilter {
    pub fn status(self) -> Option<OrderStatus> {
        match self {
            OrderStatusFilter::All => None,
            OrderStatusFilter::AwaitingPayment => Some(OrderStatus::AwaitingPayment),
            OrderStatusFilter::Processing => Some(OrderStatus::Processing),
            OrderStatusFilter::Done => Some(OrderStatus::Done),
        }
    }
}

/// Payment outcome as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

impl PaymentStatus {
    /// `None` for any value the gateway does not send as a final outcome.
    pub fn from_gateway(status: &str) -> Option<Self> {
        match status {
            "SUCCEEDED" => Some(PaymentStatus::Succeeded),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order moved to PROCESSING with this delivery.
    Paid(OrderModel),
    /// A previous delivery already recorded the payment.
    AlreadyPaid(OrderModel),
    /// The gateway reported a failure; the order is awaiting payment unless done.
    PaymentFailed(OrderModel),
}

#[derive(Debug, Clone, Copy)]
enum PaidAtChange {
    Keep,
    SetNow,
    Clear,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderSettings {
    pub tax_rate_percent: u32,
    pub payment_timeout: Duration,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            tax_rate_percent: DEFAULT_TAX_RATE_PERCENT,
            payment_timeout: Duration::from_secs(15),
        }
    }
}

impl From<&AppConfig> for OrderSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            tax_rate_percent: cfg.tax_rate_percent,
            payment_timeout: cfg.payment_request_timeout(),
        }
    }
}

/// Order lifecycle: checkout, payment reconciliation and fulfilment
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Option<Arc<EventSender>>,
    settings: OrderSettings,
}

impl OrderService {
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Option<Arc<EventSender>>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            event_sender,
            settings,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            event_sender.send_or_log(event).await;
        }
    }

    /// Runs a gateway call under the configured timeout.
    async fn with_gateway_timeout<T, F>(&self, call: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        let timeout = self.settings.payment_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::ExternalServiceError(format!(
                "Payment gateway did not answer within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn find_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    /// Applies `from -> to` as one conditional update on the order row.
    ///
    /// Returns `false` when the row was not in `from` (or, for `Done`, had no
    /// payment timestamp), in which case nothing was written.
    async fn transition(
        &self,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        paid_at: PaidAtChange,
    ) -> Result<bool, ServiceError> {
        if !from.can_transition_to(to) {
            return Err(ServiceError::InternalError(format!(
                "Undefined order transition {} -> {}",
                from, to
            )));
        }

        let now = Utc::now();
        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(to))
            .col_expr(order::Column::UpdatedAt, Expr::value(now));
        match paid_at {
            PaidAtChange::Keep => {}
            PaidAtChange::SetNow => {
                update = update.col_expr(order::Column::PaidAt, Expr::value(Some(now)));
            }
            PaidAtChange::Clear => {
                update = update.col_expr(
                    order::Column::PaidAt,
                    Expr::value(Option::<DateTime<Utc>>::None),
                );
            }
        }

        let mut update = update
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(from));
        if to == OrderStatus::Done {
            update = update.filter(order::Column::PaidAt.is_not_null());
        }

        let result = update.exec(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, %order_id, %from, %to, "Order status update failed");
            ServiceError::DatabaseError(e)
        })?;

        Ok(result.rows_affected == 1)
    }

    /// Creates an order from `request`, then asks the gateway for a QR payment.
    ///
    /// The order and its items are committed before the gateway is called. A
    /// gateway failure leaves the order awaiting payment and is reported as
    /// [`ServiceError::PaymentSetupFailed`].
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ServiceError> {
        request.validate()?;
        for line in &request.items {
            line.validate()?;
        }

        // Merge repeated products, keeping first-seen order
        let mut quantities: Vec<(Uuid, i32)> = Vec::with_capacity(request.items.len());
        for line in &request.items {
            match quantities.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, qty)) => {
                    *qty = qty.checked_add(line.quantity).ok_or_else(|| {
                        ServiceError::ValidationError("Quantity is too large".to_string())
                    })?
                }
                None => quantities.push((line.product_id, line.quantity)),
            }
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let product_ids: Vec<Uuid> = quantities.iter().map(|(id, _)| *id).collect();
        let products: HashMap<Uuid, product::Model> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        if let Some(missing) = product_ids.iter().find(|id| !products.contains_key(id)) {
            warn!(product_id = %missing, "Order references unknown product");
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                missing
            )));
        }

        let priced: Vec<(&product::Model, i32)> = quantities
            .iter()
            .filter_map(|(id, qty)| products.get(id).map(|p| (p, *qty)))
            .collect();

        let totals = pricing::compute_totals(
            priced.iter().map(|(p, qty)| (p.price, *qty)),
            self.settings.tax_rate_percent,
        )?;

        let order_id = Uuid::new_v4();
        let order_model = order::ActiveModel {
            id: Set(order_id),
            subtotal: Set(totals.subtotal),
            tax: Set(totals.tax),
            grandtotal: Set(totals.grandtotal),
            status: Set(OrderStatus::AwaitingPayment),
            external_transaction_id: Set(None),
            payment_method_id: Set(None),
            paid_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, %order_id, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let mut items = Vec::with_capacity(priced.len());
        for (product, quantity) in &priced {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                price: Set(product.price),
                quantity: Set(*quantity),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, product_id = %product.id, "Failed to insert order item");
                ServiceError::DatabaseError(e)
            })?;
            items.push(item);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(%order_id, grandtotal = totals.grandtotal, "Order created");
        self.emit(Event::OrderCreated {
            order_id,
            grandtotal: totals.grandtotal,
        })
        .await;

        let (order_model, qr_string) = self.request_payment(order_model).await?;

        Ok(CreateOrderResponse {
            order: order_model.into(),
            items: items.into_iter().map(Into::into).collect(),
            qr_string,
        })
    }

    /// Requests a QR payment for `order` and attaches the gateway references.
    async fn request_payment(
        &self,
        mut order: OrderModel,
    ) -> Result<(OrderModel, Option<String>), ServiceError> {
        let order_id = order.id;
        let payment = match self
            .with_gateway_timeout(self.gateway.create_payment_request(order.grandtotal, order_id))
            .await
        {
            Ok(payment) => payment,
            Err(e) => {
                warn!(error = %e, %order_id, "Payment request failed; order left awaiting payment");
                self.emit(Event::PaymentRequestFailed {
                    order_id,
                    reason: e.to_string(),
                })
                .await;
                return Err(ServiceError::PaymentSetupFailed {
                    order_id,
                    message: e.to_string(),
                });
            }
        };

        let PaymentRequest { id, payment_method } = payment;
        let now = Utc::now();
        let attached = OrderEntity::update_many()
            .col_expr(order::Column::ExternalTransactionId, Expr::value(id.clone()))
            .col_expr(
                order::Column::PaymentMethodId,
                Expr::value(payment_method.id.clone()),
            )
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::AwaitingPayment))
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, %order_id, "Failed to attach payment request to order");
                ServiceError::DatabaseError(e)
            })?;

        if attached.rows_affected == 0 {
            return Err(ServiceError::Unprocessable(format!(
                "Order {} is no longer awaiting payment",
                order_id
            )));
        }

        order.external_transaction_id = Some(id);
        order.payment_method_id = Some(payment_method.id);
        order.updated_at = now;

        Ok((order, payment_method.qr_string))
    }

    /// Creates an order from the cart's lines.
    ///
    /// The cart is cleared once the order is committed, including when only the
    /// payment request failed; that order is recovered through
    /// [`OrderService::retry_payment_request`], not a second checkout.
    #[instrument(skip(self, cart), fields(units = cart.item_count()))]
    pub async fn checkout(&self, cart: &mut Cart) -> Result<CreateOrderResponse, ServiceError> {
        if cart.is_empty() {
            return Err(ServiceError::ValidationError("Cart is empty".to_string()));
        }

        let result = self
            .create_order(CreateOrderRequest {
                items: cart.order_lines(),
            })
            .await;
        if matches!(result, Ok(_) | Err(ServiceError::PaymentSetupFailed { .. })) {
            cart.clear();
        }
        result
    }

    /// Applies a gateway payment report to the referenced order.
    ///
    /// Redeliveries are harmless: a success for an order that is already
    /// processing or done changes nothing, and neither does a failure for an
    /// order that is already awaiting payment or done.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn reconcile_payment(
        &self,
        order_id: Uuid,
        reported_amount: i64,
        payment_status: PaymentStatus,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let order = self.find_order(order_id).await?;

        if reported_amount != order.grandtotal {
            warn!(
                reported_amount,
                grandtotal = order.grandtotal,
                "Payment amount does not match order total"
            );
            return Err(ServiceError::ValidationError(format!(
                "Payment amount {} does not match order total {}",
                reported_amount, order.grandtotal
            )));
        }

        match payment_status {
            PaymentStatus::Succeeded => self.mark_paid(order).await,
            PaymentStatus::Failed => self.mark_payment_failed(order).await,
        }
    }

    async fn mark_paid(&self, order: OrderModel) -> Result<ReconcileOutcome, ServiceError> {
        if order.status != OrderStatus::AwaitingPayment {
            info!(order_id = %order.id, status = %order.status, "Payment already recorded");
            return Ok(ReconcileOutcome::AlreadyPaid(order));
        }

        let applied = self
            .transition(
                order.id,
                OrderStatus::AwaitingPayment,
                OrderStatus::Processing,
                PaidAtChange::SetNow,
            )
            .await?;

        let current = self.find_order(order.id).await?;
        if !applied {
            // Lost the race against another delivery
            return match current.status {
                OrderStatus::Processing | OrderStatus::Done => {
                    Ok(ReconcileOutcome::AlreadyPaid(current))
                }
                OrderStatus::AwaitingPayment => Err(ServiceError::Conflict(format!(
                    "Order {} changed while recording payment",
                    order.id
                ))),
            };
        }

        info!(order_id = %current.id, "Order paid");
        self.emit(Event::OrderPaid {
            order_id: current.id,
            amount: current.grandtotal,
        })
        .await;
        Ok(ReconcileOutcome::Paid(current))
    }

    async fn mark_payment_failed(
        &self,
        order: OrderModel,
    ) -> Result<ReconcileOutcome, ServiceError> {
        match order.status {
            OrderStatus::AwaitingPayment => return Ok(ReconcileOutcome::PaymentFailed(order)),
            OrderStatus::Done => {
                warn!(order_id = %order.id, "Ignoring payment failure for completed order");
                return Ok(ReconcileOutcome::PaymentFailed(order));
            }
            OrderStatus::Processing => {}
        }

        let applied = self
            .transition(
                order.id,
                OrderStatus::Processing,
                OrderStatus::AwaitingPayment,
                PaidAtChange::Clear,
            )
            .await?;

        let current = self.find_order(order.id).await?;
        if applied {
            self.emit(Event::OrderPaymentFailed {
                order_id: current.id,
                previous_status: OrderStatus::Processing,
            })
            .await;
        }
        Ok(ReconcileOutcome::PaymentFailed(current))
    }

    /// Marks a paid, processing order as done.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn finish_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let applied = self
            .transition(
                order_id,
                OrderStatus::Processing,
                OrderStatus::Done,
                PaidAtChange::Keep,
            )
            .await?;

        let order = self.find_order(order_id).await?;

        if !applied {
            if order.paid_at.is_none() {
                return Err(ServiceError::Unprocessable(
                    "Order has not been paid yet".to_string(),
                ));
            }
            return Err(ServiceError::Unprocessable(format!(
                "Only orders in PROCESSING can be finished; order is {}",
                order.status
            )));
        }

        info!("Order completed");
        self.emit(Event::OrderCompleted(order_id)).await;
        Ok(order.into())
    }

    /// Revenue and order counts, read from one transaction.
    #[instrument(skip(self))]
    pub async fn get_sales_report(&self) -> Result<SalesReport, ServiceError> {
        let txn = self.db_pool.begin().await?;

        let total_revenue = OrderEntity::find()
            .select_only()
            .column_as(
                Expr::cust("CAST(COALESCE(SUM(grandtotal), 0) AS BIGINT)"),
                "total_revenue",
            )
            .filter(order::Column::PaidAt.is_not_null())
            .into_tuple::<i64>()
            .one(&txn)
            .await?
            .unwrap_or(0);

        let total_ongoing_orders = OrderEntity::find()
            .filter(order::Column::Status.ne(OrderStatus::Done))
            .count(&txn)
            .await?;

        let total_completed_orders = OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Done))
            .count(&txn)
            .await?;

        txn.commit().await?;

        Ok(SalesReport {
            total_revenue,
            total_ongoing_orders,
            total_completed_orders,
        })
    }

    /// Orders matching `filter`, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderStatusFilter,
    ) -> Result<Vec<OrderSummary>, ServiceError> {
        let db = &*self.db_pool;

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = filter.status() {
            query = query.filter(order::Column::Status.eq(status));
        }
        let orders = query.all(db).await.map_err(|e| {
            error!(error = %e, "Failed to list orders");
            ServiceError::DatabaseError(e)
        })?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let counts: HashMap<Uuid, i64> = OrderItemEntity::find()
            .select_only()
            .column(order_item::Column::OrderId)
            .column_as(Expr::col(order_item::Column::Id).count(), "item_count")
            .filter(order_item::Column::OrderId.is_in(ids))
            .group_by(order_item::Column::OrderId)
            .into_tuple::<(Uuid, i64)>()
            .all(db)
            .await?
            .into_iter()
            .collect();

        Ok(orders
            .into_iter()
            .map(|o| OrderSummary {
                item_count: counts.get(&o.id).copied().unwrap_or(0),
                id: o.id,
                grandtotal: o.grandtotal,
                status: o.status,
                paid_at: o.paid_at,
                created_at: o.created_at,
            })
            .collect())
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_details(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = self.find_order(order_id).await?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .find_also_related(ProductEntity)
            .all(&*self.db_pool)
            .await?
            .into_iter()
            .map(|(item, product)| OrderDetailItem {
                subtotal: item.line_total(),
                product_name: product.map(|p| p.name).unwrap_or_default(),
                id: item.id,
                product_id: item.product_id,
                price: item.price,
                quantity: item.quantity,
            })
            .collect();

        Ok(OrderDetails {
            order: order.into(),
            items,
        })
    }

    /// `true` once the order has a payment timestamp; unknown orders are unpaid.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn check_payment_status(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        let order = OrderEntity::find_by_id(order_id).one(&*self.db_pool).await?;
        Ok(order.map(|o| o.paid_at.is_some()).unwrap_or(false))
    }

    /// Sandbox aid: asks the gateway to pay the order's QR code in full.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn simulate_payment(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let order = self.find_order(order_id).await?;
        let payment_method_id = order.payment_method_id.ok_or_else(|| {
            ServiceError::Unprocessable(format!(
                "Order {} has no payment method attached",
                order_id
            ))
        })?;

        self.with_gateway_timeout(
            self.gateway
                .simulate_payment(&payment_method_id, order.grandtotal),
        )
        .await
    }

    /// Issues a fresh QR payment for an order still awaiting payment.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn retry_payment_request(
        &self,
        order_id: Uuid,
    ) -> Result<PaymentRequestResponse, ServiceError> {
        let order = self.find_order(order_id).await?;
        if order.status != OrderStatus::AwaitingPayment {
            return Err(ServiceError::Unprocessable(format!(
                "Order {} is {}; only orders awaiting payment accept a new payment request",
                order_id, order.status
            )));
        }

        let (order, qr_string) = self.request_payment(order).await?;
        info!("Payment request reissued");
        Ok(PaymentRequestResponse {
            order: order.into(),
            qr_string,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_status_only_accepts_final_outcomes() {
        assert_eq!(
            PaymentStatus::from_gateway("SUCCEEDED"),
            Some(PaymentStatus::Succeeded)
        );
        assert_eq!(
            PaymentStatus::from_gateway("FAILED"),
            Some(PaymentStatus::Failed)
        );
        assert_eq!(PaymentStatus::from_gateway("succeeded"), None);
        assert_eq!(PaymentStatus::from_gateway("PENDING"), None);
        assert_eq!(PaymentStatus::from_gateway(""), None);
    }

    #[test]
    fn status_filter_maps_to_order_status() {
        assert_eq!(OrderStatusFilter::All.status(), None);
        assert_eq!(
            OrderStatusFilter::Done.status(),
            Some(OrderStatus::Done)
        );
        let parsed: OrderStatusFilter = serde_json::from_str("\"AWAITING_PAYMENT\"").unwrap();
        assert_eq!(parsed, OrderStatusFilter::AwaitingPayment);
    }

    #[test]
    fn create_order_request_rejects_empty_and_zero_quantity() {
        let empty = CreateOrderRequest { items: vec![] };
        assert!(empty.validate().is_err());

        let zero = OrderLine {
            product_id: Uuid::new_v4(),
            quantity: 0,
        };
        assert!(zero.validate().is_err());
    }
}
