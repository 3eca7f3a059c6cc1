//! sea-orm entities for the point-of-sale schema.

pub mod category;
pub mod order;
pub mod order_item;
pub mod product;
