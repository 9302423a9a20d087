use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    cart::{Cart, MAX_LINE_QUANTITY},
    core::{
        app_error::{AppError, FieldErrors, StdResponse},
        app_state::AppState,
    },
    forms::{AddToCartForm, UpdateCartForm},
    models::ProductEntity,
    schema::products,
    sessions::{self, CurrentSession},
};

/// Cart routes. Callers must already be wrapped in the customer authorization layer.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(add_to_cart))
            .routes(utoipa_axum::routes!(update_cart_item))
            .routes(utoipa_axum::routes!(remove_cart_item)),
    )
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CartLineView {
    pub product_id: i32,
    pub name: String,
    /// Current catalog record; `None` when the product was deleted after being added.
    pub product: Option<ProductEntity>,
    pub quantity: i32,
    /// Price snapshot taken when the product was added.
    #[schema(value_type = String)]
    pub unit_price: BigDecimal,
    #[schema(value_type = String)]
    pub subtotal: BigDecimal,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    #[schema(value_type = String)]
    pub total: BigDecimal,
}

/// Joins the session cart with the current product rows.
pub async fn cart_view(conn: &mut AsyncPgConnection, cart: &Cart) -> QueryResult<CartView> {
    let product_ids = cart.product_ids();

    let mut products: HashMap<i32, ProductEntity> = products::table
        .filter(products::id.eq_any(&product_ids))
        .select(ProductEntity::as_select())
        .get_results(conn)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

    let lines = cart
        .lines()
        .iter()
        .map(|line| CartLineView {
            product_id: line.product_id,
            name: line.name.clone(),
            product: products.remove(&line.product_id),
            quantity: line.quantity,
            unit_price: line.price.clone(),
            subtotal: line.subtotal(),
        })
        .collect();

    Ok(CartView {
        lines,
        total: cart.total(),
    })
}

/// Show the cart of the current session.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current cart", body = StdResponse<CartView, String>),
        (status = 401, description = "Not logged in")
    )
)]
async fn get_cart(
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
    let view = cart_view(conn, &cart)
        .await
        .context("Failed to get cart products")?;

    Ok(StdResponse {
        data: Some(view),
        message: Some("Get cart successfully"),
    })
}

/// Add a product to the cart, merging with an existing line for the same product.
#[utoipa::path(
    post,
    path = "/items/{product_id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("product_id" = i32, Path, description = "Product to add")
    ),
    request_body = AddToCartForm,
    responses(
        (status = 200, description = "Updated cart", body = StdResponse<CartView, String>),
        (status = 404, description = "No such product"),
        (status = 422, description = "Invalid quantity")
    )
)]
async fn add_to_cart(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<AddToCartForm>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity = products::table
        .find(product_id)
        .select(ProductEntity::as_select())
        .get_result(conn)
        .await?;

    let mut cart = sessions::load_cart(conn, session.session_id)
        .await
        .context("Failed to load cart")?;
    let Some(line) = cart.add(&product, body.quantity) else {
        let mut errors = FieldErrors::new();
        errors.add(
            "quantity",
            format!("A cart line cannot hold more than {MAX_LINE_QUANTITY} units."),
        );
        return Err(AppError::Validation(errors));
    };
    let quantity = line.quantity;
    sessions::save_cart(conn, session.session_id, &cart)
        .await
        .context("Failed to save cart")?;

    tracing::debug!(
        "User #{} has {} x product #{} in cart",
        session.user_id,
        quantity,
        product.id
    );

    let view = cart_view(conn, &cart)
        .await
        .context("Failed to get cart products")?;

    Ok(StdResponse {
        data: Some(view),
        message: Some("Added to cart successfully"),
    })
}

/// Set the quantity of a cart line. A quantity of zero removes the line.
#[utoipa::path(
    patch,
    path = "/items/{product_id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("product_id" = i32, Path, description = "Product whose line to update")
    ),
    request_body = UpdateCartForm,
    responses(
        (status = 200, description = "Updated cart", body = StdResponse<CartView, String>),
        (status = 404, description = "Product is not in the cart"),
        (status = 422, description = "Invalid quantity")
    )
)]
async fn update_cart_item(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
    Json(body): Json<UpdateCartForm>,
) -> Result<impl IntoResponse, AppError> {
    body.validate()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = sessions::load_cart(conn, session.session_id)
        .await
        .context("Failed to load cart")?;

    if !cart.set_quantity(product_id, body.quantity) {
        return Err(AppError::NotFound);
    }

    sessions::save_cart(conn, session.session_id, &cart)
        .await
        .context("Failed to save cart")?;

    let view = cart_view(conn, &cart)
        .await
        .context("Failed to get cart products")?;

    Ok(StdResponse {
        data: Some(view),
        message: Some("Updated cart successfully"),
    })
}

/// Remove a product from the cart. Removing a product that is not there is not an error.
#[utoipa::path(
    delete,
    path = "/items/{product_id}",
    tags = ["Cart"],
    security(("bearerAuth" = [])),
    params(
        ("product_id" = i32, Path, description = "Product to remove")
    ),
    responses(
        (status = 200, description = "Updated cart", body = StdResponse<CartView, String>)
    )
)]
async fn remove_cart_item(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut cart = sessions::load_cart(conn, session.session_id)
        .await
        .context("Failed to load cart")?;

    if cart.remove(product_id) {
        sessions::save_cart(conn, session.session_id, &cart)
            .await
            .context("Failed to save cart")?;
    }

    let view = cart_view(conn, &cart)
        .await
        .context("Failed to get cart products")?;

    Ok(StdResponse {
        data: Some(view),
        message: Some("Removed from cart successfully"),
    })
}
