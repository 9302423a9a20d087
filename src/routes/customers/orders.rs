use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{OrderEntity, ShippingAddressEntity},
    orders::{self, OrderSummary},
    schema::{orders as orders_table, shipping_addresses},
    sessions::CurrentSession,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_my_orders))
            .routes(utoipa_axum::routes!(get_order))
            .routes(utoipa_axum::routes!(get_order_confirmation)),
    )
}

/// Fetch all orders belonging to the authenticated customer, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "List my orders", body = StdResponse<Vec<OrderSummary>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let my_orders: Vec<OrderEntity> = orders_table::table
        .filter(orders_table::user_id.eq(session.user_id))
        .order_by((orders_table::created_at.desc(), orders_table::id.desc()))
        .select(OrderEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get my orders")?;

    let summaries = orders::summarize(conn, my_orders)
        .await
        .context("Failed to get order items")?;

    Ok(StdResponse {
        data: Some(summaries),
        message: Some("Get my orders successfully"),
    })
}

#[derive(Serialize, ToSchema)]
pub struct GetOrderRes {
    pub order: OrderSummary,
    /// `None` once the address has been deleted.
    pub shipping_address: Option<ShippingAddressEntity>,
}

async fn load_own_order(
    conn: &mut AsyncPgConnection,
    id: i32,
    user_id: i32,
) -> Result<GetOrderRes, AppError> {
    let order: OrderEntity = orders_table::table
        .find(id)
        .filter(orders_table::user_id.eq(user_id))
        .select(OrderEntity::as_select())
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

    Ok(GetOrderRes {
        order,
        shipping_address,
    })
}

/// Fetch one order of the authenticated customer.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to fetch")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "No such order for this customer")
    )
)]
async fn get_order(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = load_own_order(conn, id, session.user_id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Get order successfully"),
    })
}

/// Confirmation view shown right after checkout. Same content as the order detail.
#[utoipa::path(
    get,
    path = "/{id}/confirmation",
    tags = ["Orders"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Order ID to confirm")
    ),
    responses(
        (status = 200, description = "Order confirmation", body = StdResponse<GetOrderRes, String>),
        (status = 404, description = "No such order for this customer")
    )
)]
async fn get_order_confirmation(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order = load_own_order(conn, id, session.user_id).await?;

    Ok(StdResponse {
        data: Some(order),
        message: Some("Order confirmed"),
    })
}
