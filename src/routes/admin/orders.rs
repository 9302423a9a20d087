use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, PgTextExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{OrderEntity, OrderStatus, ShippingAddressEntity},
    orders::{self, OrderSummary},
    routes::admin::search_term,
    schema::{orders as orders_table, shipping_addresses, users},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(update_order_status)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct OrdersQuery {
    status: Option<OrderStatus>,
    user_id: Option<i32>,
    /// Case-insensitive search on the customer's username.
    q: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminOrderRow {
    pub username: String,
    /// "name (xN)" for every line, comma separated.
    pub products: String,
    pub summary: OrderSummary,
}

fn describe_products(summary: &OrderSummary) -> String {
    summary
        .order_items
        .iter()
        .map(|item| format!("{} (x{})", item.product_name, item.line_item.quantity))
        .collect::<Vec<_>>()
        .join(", ")
}

/// List all orders, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(OrdersQuery),
    responses(
        (status = 200, description = "List orders", body = StdResponse<Vec<AdminOrderRow>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut statement = orders_table::table
        .inner_join(users::table)
        .order_by((orders_table::created_at.desc(), orders_table::id.desc()))
        .into_boxed();
    if let Some(status) = query.status {
        statement = statement.filter(orders_table::status.eq(status.as_str()));
    }
    if let Some(user_id) = query.user_id {
        statement = statement.filter(orders_table::user_id.eq(user_id));
    }
    if let Some(pattern) = search_term(query.q.as_deref()) {
        statement = statement.filter(users::username.ilike(pattern));
    }

    let rows: Vec<(OrderEntity, String)> = statement
        .select((OrderEntity::as_select(), users::username))
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let (found_orders, usernames): (Vec<OrderEntity>, Vec<String>) = rows.into_iter().unzip();
    let summaries = orders::summarize(conn, found_orders)
        .await
        .context("Failed to get order items")?;

    let rows: Vec<AdminOrderRow> = summaries
        .into_iter()
        .zip(usernames)
        .map(|(summary, username)| AdminOrderRow {
            username,
            products: describe_products(&summary),
            summary,
        })
        .collect();

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Get orders successfully"),
    })
}

#[derive(Serialize, ToSchema)]
pub struct AdminOrderRes {
    pub username: String,
    pub order: OrderSummary,
    pub shipping_address: Option<ShippingAddressEntity>,
}

/// Fetch any order with its shipping address.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<AdminOrderRes, String>),
        (status = 404, description = "No such order")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (order, username): (OrderEntity, String) = orders_table::table
        .inner_join(users::table)
        .filter(orders_table::id.eq(id))
        .select((OrderEntity::as_select(), users::username))
        .get_result(conn)
        .await?;

    let shipping_address = match order.shipping_address_id {
        Some(address_id) => shipping_addresses::table
            .find(address_id)
            .select(ShippingAddressEntity::as_select())
            .get_result(conn)
            .await
            .optional()
            .context("Failed to get shipping address")?,
        None => None,
    };

    let order = orders::summarize(conn, vec![order])
        .await
        .context("Failed to get order items")?
        .pop()
        .ok_or(AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(AdminOrderRes {
            username,
            order,
            shipping_address,
        }),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderStatusReq {
    pub status: OrderStatus,
}

/// Move an order to another status.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to update")
    ),
    request_body = UpdateOrderStatusReq,
    responses(
        (status = 200, description = "Updated order", body = StdResponse<OrderEntity, String>),
        (status = 404, description = "No such order")
    )
)]
async fn update_order_status(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateOrderStatusReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: OrderEntity = diesel::update(orders_table::table.find(id))
        .set(orders_table::status.eq(body.status.as_str()))
        .returning(OrderEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Order #{} moved to {}", order.id, body.status);

    Ok(StdResponse {
        data: Some(order),
        message: Some("Updated order successfully"),
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        models::{LineItemEntity, ProductEntity},
        orders::OrderLineView,
    };

    #[test]
    fn products_column_lists_names_and_quantities() {
        let product = |id: i32, name: &str| ProductEntity {
            id,
            name: name.into(),
            description: String::new(),
            price: "1.00".parse().unwrap(),
            stock: 5,
            image: None,
            available: true,
            category_id: 1,
        };
        let line = |id: i32, product_id: i32, quantity: i32| LineItemEntity {
            id,
            order_id: 7,
            product_id,
            quantity,
        };
        let order = OrderEntity {
            id: 7,
            user_id: 1,
            created_at: Utc::now(),
            status: "espera".into(),
            shipping_address_id: None,
        };

        let summary = OrderSummary::new(
            order,
            vec![
                OrderLineView::new(line(1, 1, 2), &product(1, "Café")),
                OrderLineView::new(line(2, 2, 1), &product(2, "Té verde")),
            ],
        );

        assert_eq!(describe_products(&summary), "Café (x2), Té verde (x1)");
    }
}
