#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use pos_api::{
    config::AppConfig,
    db::{self, DbConfig},
    errors::ServiceError,
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        categories::{CategoryInput, CategoryResponse},
        image_store::ImageStore,
        orders::{CreateOrderRequest, CreateOrderResponse, OrderLine, OrderSettings},
        payment_gateway::{PaymentGateway, PaymentMethodHandle, PaymentRequest},
        products::{CreateProductRequest, ProductResponse},
    },
    AppState,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const WEBHOOK_TOKEN: &str = "test-callback-token";
pub const WEBHOOK_PATH: &str = "/api/v1/payments/webhook";

/// Gateway double: hands out deterministic ids and can be told to fail or hang.
#[derive(Default)]
pub struct StubGateway {
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pub payment_requests: AtomicUsize,
    pub simulated: Mutex<Vec<(String, i64)>>,
}

impl StubGateway {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Payment requests sleep this long before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_request(
        &self,
        amount: i64,
        reference_id: Uuid,
    ) -> Result<PaymentRequest, ServiceError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::ExternalServiceError(
                "gateway unavailable".to_string(),
            ));
        }
        let n = self.payment_requests.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentRequest {
            id: format!("pr-{}-{}", reference_id, n),
            payment_method: PaymentMethodHandle {
                id: format!("pm-{}-{}", reference_id, n),
                qr_string: Some(format!("QR:{}", amount)),
            },
        })
    }

    async fn simulate_payment(
        &self,
        payment_method_id: &str,
        amount: i64,
    ) -> Result<(), ServiceError> {
        self.simulated
            .lock()
            .unwrap()
            .push((payment_method_id.to_string(), amount));
        Ok(())
    }
}

/// Image store double that records every removal.
#[derive(Default)]
pub struct RecordingImageStore {
    pub removed: Mutex<Vec<String>>,
}

#[async_trait]
impl ImageStore for RecordingImageStore {
    async fn remove(&self, path: &str) -> Result<(), ServiceError> {
        self.removed.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

/// Helper harness for spinning up an application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<StubGateway>,
    pub images: Arc<RecordingImageStore>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::build(None).await
    }

    /// Same as [`TestApp::new`] but gateway calls give up after `timeout`.
    pub async fn with_payment_timeout(timeout: Duration) -> Self {
        Self::build(Some(timeout)).await
    }

    async fn build(payment_timeout: Option<Duration>) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.payment_webhook_token = Some(WEBHOOK_TOKEN.to_string());

        let pool = db::establish_connection_with_config(&DbConfig::in_memory_sqlite())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let gateway = Arc::new(StubGateway::default());
        let images = Arc::new(RecordingImageStore::default());
        let mut order_settings = OrderSettings::from(&cfg);
        if let Some(timeout) = payment_timeout {
            order_settings.payment_timeout = timeout;
        }
        let services = AppServices::new(
            db_arc.clone(),
            Arc::new(event_sender.clone()),
            gateway.clone(),
            images.clone(),
            order_settings,
        );

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };
        let router = pos_api::app_router(state.clone());

        Self {
            router,
            state,
            gateway,
            images,
            _event_task: event_task,
        }
    }

    /// Send a request against the router with optional JSON body and extra headers.
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    /// Delivers a webhook carrying the configured callback token.
    pub async fn webhook(&self, payload: Value) -> Response {
        self.request_with_headers(
            Method::POST,
            WEBHOOK_PATH,
            Some(payload),
            &[("x-callback-token", WEBHOOK_TOKEN)],
        )
        .await
    }

    pub async fn seed_category(&self, name: &str) -> CategoryResponse {
        self.state
            .services
            .categories
            .create_category(CategoryInput {
                name: name.to_string(),
            })
            .await
            .expect("seed category for tests")
    }

    pub async fn seed_product(&self, category_id: Uuid, name: &str, price: i64) -> ProductResponse {
        self.state
            .services
            .products
            .create_product(CreateProductRequest {
                name: name.to_string(),
                price,
                category_id,
                image_url: format!("https://cdn.example.com/product-images/{}.png", name),
            })
            .await
            .expect("seed product for tests")
    }

    pub async fn place_order(&self, lines: &[(Uuid, i32)]) -> CreateOrderResponse {
        self.state
            .services
            .order
            .create_order(CreateOrderRequest {
                items: lines
                    .iter()
                    .map(|(product_id, quantity)| OrderLine {
                        product_id: *product_id,
                        quantity: *quantity,
                    })
                    .collect(),
            })
            .await
            .expect("place order for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Webhook body in the gateway's shape.
pub fn payment_payload(order_id: &str, amount: i64, status: &str) -> Value {
    serde_json::json!({
        "event": if status == "SUCCEEDED" { "payment.succeeded" } else { "payment.failed" },
        "data": {
            "id": "py-test",
            "amount": amount,
            "payment_request_id": "pr-test",
            "reference_id": order_id,
            "status": status
        }
    })
}
