pub mod categories;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod reports;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    categories::CategoryService,
    image_store::ImageStore,
    orders::{OrderService, OrderSettings},
    payment_gateway::PaymentGateway,
    products::ProductService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub order: Arc<OrderService>,
    pub products: Arc<ProductService>,
    pub categories: Arc<CategoryService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        image_store: Arc<dyn ImageStore>,
        order_settings: OrderSettings,
    ) -> Self {
        let order = Arc::new(OrderService::new(
            db_pool.clone(),
            gateway,
            Some(event_sender),
            order_settings,
        ));
        let products = Arc::new(ProductService::new(db_pool.clone(), image_store));
        let categories = Arc::new(CategoryService::new(db_pool));

        Self {
            order,
            products,
            categories,
        }
    }
}
