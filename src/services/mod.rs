// Order lifecycle
pub mod cart;
pub mod orders;
pub mod pricing;

// Catalog
pub mod categories;
pub mod products;

// External collaborators
pub mod image_store;
pub mod payment_gateway;
