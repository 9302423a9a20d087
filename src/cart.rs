//! Session-held shopping cart.
//!
//! The cart lives as a JSON list inside the caller's session row and is only
//! turned into persisted rows at checkout. Lines are merged by product id.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::models::ProductEntity;

/// Upper bound for the quantity of a single cart line.
pub const MAX_LINE_QUANTITY: i32 = 9_999;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct CartLine {
    pub product_id: i32,
    pub name: String,
    /// Unit price captured when the product was first added.
    #[schema(value_type = String, example = "19.90")]
    pub price: BigDecimal,
    pub quantity: i32,
}

impl CartLine {
    pub fn subtotal(&self) -> BigDecimal {
        &self.price * BigDecimal::from(self.quantity)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the `sessions.cart` column. Anything unreadable counts as an empty cart.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|err| {
            tracing::warn!("Discarding unreadable session cart: {}", err);
            Cart::new()
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn get(&self, product_id: i32) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    pub fn product_ids(&self) -> Vec<i32> {
        self.lines.iter().map(|line| line.product_id).collect()
    }

    /// Adds `quantity` units of `product`, merging into an existing line for the same product.
    ///
    /// The price snapshot of an existing line is kept; there is no stock check.
    /// Returns `None`, leaving the cart untouched, when the line would exceed [`MAX_LINE_QUANTITY`].
    pub fn add(&mut self, product: &ProductEntity, quantity: i32) -> Option<&CartLine> {
        let position = self
            .lines
            .iter()
            .position(|line| line.product_id == product.id);
        let merged = match position {
            Some(index) => self.lines[index].quantity.checked_add(quantity)?,
            None => quantity,
        };
        if !(1..=MAX_LINE_QUANTITY).contains(&merged) {
            return None;
        }

        let index = match position {
            Some(index) => {
                self.lines[index].quantity = merged;
                index
            }
            None => {
                self.lines.push(CartLine {
                    product_id: product.id,
                    name: product.name.clone(),
                    price: product.price.clone(),
                    quantity: merged,
                });
                self.lines.len() - 1
            }
        };

        Some(&self.lines[index])
    }

    /// Sets the quantity of a line. Zero removes it. Returns `false` when the product is not in the cart.
    pub fn set_quantity(&mut self, product_id: i32, quantity: i32) -> bool {
        let Some(index) = self
            .lines
            .iter()
            .position(|line| line.product_id == product_id)
        else {
            return false;
        };

        if quantity <= 0 {
            self.lines.remove(index);
        } else {
            self.lines[index].quantity = quantity;
        }
        true
    }

    /// Drops the line for `product_id`, returning whether one was present.
    pub fn remove(&mut self, product_id: i32) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Sum of snapshot price times quantity over every line.
    pub fn total(&self) -> BigDecimal {
        self.lines
            .iter()
            .fold(BigDecimal::from(0), |acc, line| acc + line.subtotal())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn product(id: i32, price: &str) -> ProductEntity {
        ProductEntity {
            id,
            name: format!("Producto {id}"),
            description: String::new(),
            price: price.parse().unwrap(),
            stock: 10,
            image: None,
            available: true,
            category_id: 1,
        }
    }

    #[test]
    fn adding_the_same_product_twice_merges_quantities() {
        let mut cart = Cart::new();
        let cafe = product(1, "12.50");

        cart.add(&cafe, 2);
        cart.add(&cafe, 3);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(1).map(|line| line.quantity), Some(5));
    }

    #[test]
    fn merging_past_the_line_limit_is_refused() {
        let mut cart = Cart::new();
        let cafe = product(1, "1.00");

        assert!(cart.add(&cafe, MAX_LINE_QUANTITY).is_some());
        assert!(cart.add(&cafe, 1).is_none());
        assert_eq!(cart.get(1).map(|line| line.quantity), Some(MAX_LINE_QUANTITY));

        let mut cart = Cart::new();
        cart.add(&cafe, 5);
        assert!(cart.add(&cafe, i32::MAX).is_none());
        assert_eq!(cart.get(1).map(|line| line.quantity), Some(5));
        assert!(cart.add(&product(2, "1.00"), 0).is_none());
        assert_eq!(cart.len(), 1);
    }

    #[test]
    fn merging_keeps_the_first_price_snapshot() {
        let mut cart = Cart::new();
        cart.add(&product(1, "10.00"), 1);
        cart.add(&product(1, "99.00"), 1);

        assert_eq!(cart.get(1).unwrap().price, "10.00".parse::<BigDecimal>().unwrap());
        assert_eq!(cart.total(), "20.00".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn distinct_products_append_in_order() {
        let mut cart = Cart::new();
        cart.add(&product(3, "1.00"), 1);
        cart.add(&product(1, "2.00"), 1);
        cart.add(&product(3, "1.00"), 1);

        assert_eq!(cart.product_ids(), vec![3, 1]);
    }

    #[test]
    fn total_sums_snapshot_price_times_quantity() {
        let mut cart = Cart::new();
        cart.add(&product(1, "12.50"), 2);
        cart.add(&product(2, "3.10"), 3);

        assert_eq!(cart.total(), "34.30".parse::<BigDecimal>().unwrap());
        assert_eq!(Cart::new().total(), BigDecimal::from(0));
    }

    #[test]
    fn set_quantity_updates_or_removes() {
        let mut cart = Cart::new();
        cart.add(&product(1, "1.00"), 1);
        cart.add(&product(2, "1.00"), 1);

        assert!(cart.set_quantity(1, 7));
        assert_eq!(cart.get(1).unwrap().quantity, 7);

        assert!(cart.set_quantity(2, 0));
        assert!(cart.get(2).is_none());

        assert!(!cart.set_quantity(42, 1));
    }

    #[test]
    fn remove_is_a_no_op_for_unknown_products() {
        let mut cart = Cart::new();
        cart.add(&product(1, "1.00"), 1);

        assert!(!cart.remove(2));
        assert!(cart.remove(1));
        assert!(cart.is_empty());
    }

    #[test]
    fn decodes_the_session_column_and_tolerates_garbage() {
        let cart = Cart::from_value(json!([
            { "product_id": 4, "name": "Té", "price": "5.25", "quantity": 2 }
        ]));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get(4).unwrap().subtotal(), "10.50".parse::<BigDecimal>().unwrap());

        assert!(Cart::from_value(json!({ "not": "a list" })).is_empty());
    }

    #[test]
    fn encodes_back_to_a_json_list() {
        let mut cart = Cart::new();
        cart.add(&product(1, "2.00"), 1);

        let value = cart.to_value();
        assert!(value.is_array());
        assert_eq!(Cart::from_value(value), cart);
    }
}
