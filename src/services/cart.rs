//! Client-side cart that feeds checkout.
//!
//! A cart is an ordinary value owned by the caller and passed into
//! [`OrderService::checkout`](crate::services::orders::OrderService::checkout).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::product;
use crate::services::orders::OrderLine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one unit of `product`, merging with an existing line.
    pub fn add(&mut self, product: &product::Model) {
        match self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product.id)
        {
            Some(line) => line.quantity = line.quantity.saturating_add(1),
            None => self.lines.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                quantity: 1,
            }),
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn order_lines(&self) -> Vec<OrderLine> {
        self.lines
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.quantity)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(name: &str, price: i64) -> product::Model {
        product::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            price,
            category_id: Uuid::new_v4(),
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn adding_same_product_increments_quantity() {
        let coffee = product("Kopi Susu", 18_000);
        let bread = product("Roti Bakar", 15_000);
        let mut cart = Cart::new();

        cart.add(&coffee);
        cart.add(&bread);
        cart.add(&coffee);

        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.lines()[0].quantity, 2);
        assert_eq!(cart.item_count(), 3);

        let lines = cart.order_lines();
        assert_eq!(lines[0].product_id, coffee.id);
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn clear_empties_the_cart() {
        let mut cart = Cart::new();
        cart.add(&product("Teh", 8_000));
        assert!(!cart.is_empty());

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.item_count(), 0);
    }
}
