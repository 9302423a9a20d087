//! Read-side helpers shared by the customer and back-office order views.

use std::collections::HashMap;

use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    models::{LineItemEntity, OrderEntity, OrderStatus, ProductEntity},
    schema::{line_items, products},
};

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderLineView {
    pub line_item: LineItemEntity,
    pub product_name: String,
    /// Current product price; line items do not snapshot prices.
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
}

impl OrderLineView {
    pub fn new(line_item: LineItemEntity, product: &ProductEntity) -> Self {
        let subtotal = &product.price * BigDecimal::from(line_item.quantity);
        Self {
            line_item,
            product_name: product.name.clone(),
            unit_price: product.price.clone(),
            subtotal,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct OrderSummary {
    pub order: OrderEntity,
    pub status_label: String,
    pub order_items: Vec<OrderLineView>,
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
}

impl OrderSummary {
    pub fn new(order: OrderEntity, order_items: Vec<OrderLineView>) -> Self {
        let subtotal = order_items
            .iter()
            .fold(BigDecimal::from(0), |acc, item| acc + &item.subtotal);
        let status_label = order
            .status
            .parse::<OrderStatus>()
            .map(|status| status.label().to_string())
            .unwrap_or_else(|_| order.status.clone());

        Self {
            order,
            status_label,
            order_items,
            subtotal,
        }
    }
}

/// Loads the line items of `orders` joined with their products and builds one summary per order,
/// preserving the order of `orders`.
pub async fn summarize(
    conn: &mut AsyncPgConnection,
    orders: Vec<OrderEntity>,
) -> QueryResult<Vec<OrderSummary>> {
    let order_ids: Vec<i32> = orders.iter().map(|order| order.id).collect();

    let rows: Vec<(LineItemEntity, ProductEntity)> = line_items::table
        .inner_join(products::table)
        .filter(line_items::order_id.eq_any(&order_ids))
        .order_by(line_items::id.asc())
        .select((LineItemEntity::as_select(), ProductEntity::as_select()))
        .get_results(conn)
        .await?;

    let mut group: HashMap<i32, Vec<OrderLineView>> = HashMap::new();
    for (line_item, product) in rows {
        group
            .entry(line_item.order_id)
            .or_default()
            .push(OrderLineView::new(line_item, &product));
    }

    Ok(orders
        .into_iter()
        .map(|order| {
            let order_items = group.remove(&order.id).unwrap_or_default();
            OrderSummary::new(order, order_items)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(id: i32, price: &str) -> ProductEntity {
        ProductEntity {
            id,
            name: format!("Producto {id}"),
            description: String::new(),
            price: price.parse().unwrap(),
            stock: 0,
            image: None,
            available: true,
            category_id: 1,
        }
    }

    fn line(id: i32, product_id: i32, quantity: i32) -> LineItemEntity {
        LineItemEntity {
            id,
            order_id: 1,
            product_id,
            quantity,
        }
    }

    #[test]
    fn subtotal_uses_current_product_prices() {
        let order = OrderEntity {
            id: 1,
            user_id: 1,
            created_at: Utc::now(),
            status: "en_camino".into(),
            shipping_address_id: None,
        };
        let items = vec![
            OrderLineView::new(line(1, 1, 2), &product(1, "4.50")),
            OrderLineView::new(line(2, 2, 1), &product(2, "10.00")),
        ];

        let summary = OrderSummary::new(order, items);
        assert_eq!(summary.subtotal, "19.00".parse::<BigDecimal>().unwrap());
        assert_eq!(summary.status_label, "En camino");
    }

    #[test]
    fn empty_orders_total_zero() {
        let order = OrderEntity {
            id: 2,
            user_id: 1,
            created_at: Utc::now(),
            status: "espera".into(),
            shipping_address_id: None,
        };
        let summary = OrderSummary::new(order, Vec::new());
        assert_eq!(summary.subtotal, BigDecimal::from(0));
        assert_eq!(summary.status_label, "En espera");
    }
}
