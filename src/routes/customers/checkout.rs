use anyhow::Context;
use axum::{Extension, Json, extract::State, response::IntoResponse};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    cart::Cart,
    core::{
        app_error::{AppError, FieldErrors, StdResponse},
        app_state::AppState,
    },
    forms::ShippingAddressForm,
    models::{
        CreateLineItemEntity, CreateOrderEntity, LineItemEntity, OrderEntity, OrderStatus,
        ShippingAddressEntity,
    },
    orders::{self, OrderSummary},
    routes::customers::cart::{CartView, cart_view},
    schema::{
        line_items, orders as orders_table, products, sessions as sessions_table,
        shipping_addresses,
    },
    sessions::{self, CurrentSession},
};

const EMPTY_CART: &str = "Cart is empty";
const UNAVAILABLE_PRODUCTS: &str = "These products no longer exist, remove them from the cart: ";

/// Names of the cart lines whose product is not among `found`.
fn missing_products(cart: &Cart, found: &[i32]) -> Vec<String> {
    cart.lines()
        .iter()
        .filter(|line| !found.contains(&line.product_id))
        .map(|line| format!("{} (#{})", line.name, line.product_id))
        .collect()
}

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/checkout",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_checkout))
            .routes(utoipa_axum::routes!(place_order)),
    )
}

#[derive(Serialize, ToSchema)]
struct GetCheckoutRes {
    pub cart: CartView,
    /// Addresses used in earlier orders.
    pub saved_addresses: Vec<ShippingAddressEntity>,
}

/// What the checkout page shows: the cart and the customer's saved addresses.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Checkout"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Checkout summary", body = StdResponse<GetCheckoutRes, String>),
        (status = 400, description = "Cart is empty")
    )
)]
async fn get_checkout(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = sessions::load_cart(conn, session.session_id)
        .await
        .context("Failed to load cart")?;
    if cart.is_empty() {
        return Err(AppError::BadRequest(EMPTY_CART.into()));
    }

    let cart = cart_view(conn, &cart)
        .await
        .context("Failed to get cart products")?;

    let saved_addresses: Vec<ShippingAddressEntity> = shipping_addresses::table
        .filter(shipping_addresses::user_id.eq(session.user_id))
        .order_by(shipping_addresses::id.desc())
        .select(ShippingAddressEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get saved addresses")?;

    Ok(StdResponse {
        data: Some(GetCheckoutRes {
            cart,
            saved_addresses,
        }),
        message: Some("Get checkout successfully"),
    })
}

#[derive(Serialize, ToSchema)]
pub struct PlaceOrderRes {
    pub order: OrderSummary,
    pub shipping_address: ShippingAddressEntity,
}

/// Turn the cart into an order shipped to the given address, then empty the cart.
///
/// The address, the order, its line items and the cart reset are written in one transaction.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Checkout"],
    security(("bearerAuth" = [])),
    request_body = ShippingAddressForm,
    responses(
        (status = 200, description = "Order placed", body = StdResponse<PlaceOrderRes, String>),
        (status = 400, description = "Cart is empty or holds deleted products"),
        (status = 422, description = "Invalid address", body = StdResponse<FieldErrors, String>)
    )
)]
async fn place_order(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<ShippingAddressForm>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let cart = sessions::load_cart(conn, session.session_id)
        .await
        .context("Failed to load cart")?;
    if cart.is_empty() {
        return Err(AppError::BadRequest(EMPTY_CART.into()));
    }

    let form = body.clean().map_err(AppError::Validation)?;

    let (order, shipping_address) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                // Lock the session row so a double submit cannot order the same cart twice.
                let cart: Value = sessions_table::table
                    .find(session.session_id)
                    .select(sessions_table::cart)
                    .for_update()
                    .get_result(conn)
                    .await?;
                let mut cart = Cart::from_value(cart);
                if cart.is_empty() {
                    return Err(AppError::BadRequest(EMPTY_CART.into()));
                }

                // Key-share locks keep the products from being deleted until commit.
                let found: Vec<i32> = products::table
                    .filter(products::id.eq_any(cart.product_ids()))
                    .select(products::id)
                    .for_key_share()
                    .get_results(conn)
                    .await
                    .context("Failed to check cart products")?;
                let missing = missing_products(&cart, &found);
                if !missing.is_empty() {
                    return Err(AppError::BadRequest(format!(
                        "{UNAVAILABLE_PRODUCTS}{}",
                        missing.join(", ")
                    )));
                }

                let shipping_address: ShippingAddressEntity =
                    diesel::insert_into(shipping_addresses::table)
                        .values(form.into_entity(session.user_id))
                        .returning(ShippingAddressEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to save shipping address")?;

                let order: OrderEntity = diesel::insert_into(orders_table::table)
                    .values(CreateOrderEntity {
                        user_id: session.user_id,
                        status: OrderStatus::Espera.to_string(),
                        shipping_address_id: Some(shipping_address.id),
                    })
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to create order")?;

                let new_items: Vec<CreateLineItemEntity> = cart
                    .lines()
                    .iter()
                    .map(|line| CreateLineItemEntity {
                        order_id: order.id,
                        product_id: line.product_id,
                        quantity: line.quantity,
                    })
                    .collect();

                let created: Vec<LineItemEntity> = diesel::insert_into(line_items::table)
                    .values(new_items)
                    .returning(LineItemEntity::as_returning())
                    .get_results(conn)
                    .await
                    .context("Failed to create line items")?;

                cart.clear();
                sessions::save_cart(conn, session.session_id, &cart)
                    .await
                    .context("Failed to empty cart")?;

                tracing::info!(
                    "Order #{} placed by user #{} with {} line items",
                    order.id,
                    session.user_id,
                    created.len()
                );

                Ok::<(OrderEntity, ShippingAddressEntity), AppError>((order, shipping_address))
            })
        })
        .await?;

    let order = orders::summarize(conn, vec![order])
        .await
        .context("Failed to get order items")?
        .pop()
        .context("Placed order vanished")?;

    Ok(StdResponse {
        data: Some(PlaceOrderRes {
            order,
            shipping_address,
        }),
        message: Some("Order placed successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductEntity;

    fn product(id: i32, name: &str) -> ProductEntity {
        ProductEntity {
            id,
            name: name.into(),
            description: String::new(),
            price: "2.00".parse().unwrap(),
            stock: 3,
            image: None,
            available: true,
            category_id: 1,
        }
    }

    #[test]
    fn lines_without_a_product_row_are_reported_by_name() {
        let mut cart = Cart::new();
        cart.add(&product(1, "Café"), 1);
        cart.add(&product(2, "Té verde"), 2);
        cart.add(&product(3, "Cacao"), 1);

        assert_eq!(
            missing_products(&cart, &[1, 3]),
            vec!["Té verde (#2)".to_string()]
        );
        assert!(missing_products(&cart, &[1, 2, 3]).is_empty());
    }
}
