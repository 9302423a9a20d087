use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{
    BoolExpressionMethods, ExpressionMethods, OptionalExtension, PgTextExpressionMethods,
    QueryDsl, SelectableHelper,
};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    core::{
        app_error::{AppError, FieldErrors, StdResponse},
        app_state::AppState,
    },
    models::{CreateProductEntity, ProductEntity, UpdateProductEntity},
    routes::admin::{check_decimal, search_term},
    schema::{categories, products},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/products",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_products))
            .routes(utoipa_axum::routes!(create_product))
            .routes(utoipa_axum::routes!(update_product))
            .routes(utoipa_axum::routes!(delete_product))
            .routes(utoipa_axum::routes!(reduce_product_stock)),
    )
}

const NEGATIVE_QUANTITY: &str = "Quantity cannot be negative.";

/// Decrements stock and saves it. There is no floor at zero: stock may go negative,
/// but never below what the column can hold.
pub async fn reduce_stock(
    conn: &mut AsyncPgConnection,
    product_id: i32,
    quantity: i32,
) -> Result<ProductEntity, AppError> {
    if quantity < 0 {
        let mut errors = FieldErrors::new();
        errors.add("quantity", NEGATIVE_QUANTITY);
        return Err(AppError::Validation(errors));
    }

    let updated: Option<ProductEntity> = diesel::update(
        products::table
            .find(product_id)
            .filter(products::stock.ge(i32::MIN + quantity)),
    )
    .set(products::stock.eq(products::stock - quantity))
    .returning(ProductEntity::as_returning())
    .get_result(conn)
    .await
    .optional()
    .context("Failed to reduce stock")?;

    match updated {
        Some(product) => Ok(product),
        None => {
            let exists: i64 = products::table
                .find(product_id)
                .count()
                .get_result(conn)
                .await
                .context("Failed to check product")?;
            if exists == 0 {
                return Err(AppError::NotFound);
            }
            let mut errors = FieldErrors::new();
            errors.add("quantity", "Stock cannot be reduced that far.");
            Err(AppError::Validation(errors))
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct ProductsQuery {
    available: Option<bool>,
    category_id: Option<i32>,
    /// Case-insensitive search on name and description.
    q: Option<String>,
}

/// List every product, available or not.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(ProductsQuery),
    responses(
        (status = 200, description = "List products", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn get_products(
    State(state): State<AppState>,
    Query(query): Query<ProductsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut statement = products::table.order_by(products::id.asc()).into_boxed();
    if let Some(available) = query.available {
        statement = statement.filter(products::available.eq(available));
    }
    if let Some(category_id) = query.category_id {
        statement = statement.filter(products::category_id.eq(category_id));
    }
    if let Some(pattern) = search_term(query.q.as_deref()) {
        statement = statement.filter(
            products::name
                .ilike(pattern.clone())
                .or(products::description.ilike(pattern)),
        );
    }

    let products: Vec<ProductEntity> = statement
        .select(ProductEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get products")?;

    Ok(StdResponse {
        data: Some(products),
        message: Some("Get products successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateProductReq {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "19.90")]
    pub price: BigDecimal,
    pub stock: i32,
    pub image: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
    pub category_id: i32,
}

fn default_available() -> bool {
    true
}

fn check_name(errors: &mut FieldErrors, name: &str) {
    if name.is_empty() {
        errors.add("name", "This field is required.");
    } else if name.chars().count() > 100 {
        errors.add("name", "Ensure this value has at most 100 characters.");
    }
}

fn check_image(errors: &mut FieldErrors, image: &str) {
    if image.chars().count() > 100 {
        errors.add("image", "Ensure this value has at most 100 characters.");
    }
}

async fn category_exists(conn: &mut AsyncPgConnection, id: i32) -> Result<bool, AppError> {
    let count: i64 = categories::table
        .find(id)
        .count()
        .get_result(conn)
        .await
        .context("Failed to check category")?;
    Ok(count > 0)
}

/// Create a product.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    request_body = CreateProductReq,
    responses(
        (status = 200, description = "Created product", body = StdResponse<ProductEntity, String>),
        (status = 422, description = "Invalid form", body = StdResponse<FieldErrors, String>)
    )
)]
async fn create_product(
    State(state): State<AppState>,
    Json(body): Json<CreateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let name = body.name.trim().to_string();
    let image = body
        .image
        .map(|image| image.trim().to_string())
        .filter(|image| !image.is_empty());

    let mut errors = FieldErrors::new();
    check_name(&mut errors, &name);
    check_decimal(&mut errors, "price", &body.price, 10, 2);
    if let Some(image) = &image {
        check_image(&mut errors, image);
    }
    if !category_exists(conn, body.category_id).await? {
        errors.add("category_id", "Select a valid choice.");
    }
    errors.into_result()?;

    let product: ProductEntity = diesel::insert_into(products::table)
        .values(CreateProductEntity {
            name,
            description: body.description,
            price: body.price,
            stock: body.stock,
            image,
            available: body.available,
            category_id: body.category_id,
        })
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create product")?;

    tracing::info!("Product #{} '{}' created", product.id, product.name);

    Ok(StdResponse {
        data: Some(product),
        message: Some("Created product successfully"),
    })
}

/// Partial product update; absent fields stay unchanged. An empty `image` clears it.
#[derive(Deserialize, ToSchema)]
struct UpdateProductReq {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "19.90")]
    pub price: Option<BigDecimal>,
    pub stock: Option<i32>,
    pub image: Option<String>,
    pub available: Option<bool>,
    pub category_id: Option<i32>,
}

/// Update product fields, including the quick-edit price, stock and availability.
#[utoipa::path(
    patch,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to update")
    ),
    request_body = UpdateProductReq,
    responses(
        (status = 200, description = "Updated product", body = StdResponse<ProductEntity, String>),
        (status = 400, description = "Nothing to update"),
        (status = 404, description = "No such product"),
        (status = 422, description = "Invalid form", body = StdResponse<FieldErrors, String>)
    )
)]
async fn update_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<UpdateProductReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut errors = FieldErrors::new();
    let name = body.name.map(|name| name.trim().to_string());
    if let Some(name) = &name {
        check_name(&mut errors, name);
    }
    if let Some(price) = &body.price {
        check_decimal(&mut errors, "price", price, 10, 2);
    }
    let image = body.image.map(|image| {
        let image = image.trim().to_string();
        check_image(&mut errors, &image);
        Some(image).filter(|image| !image.is_empty())
    });
    if let Some(category_id) = body.category_id {
        if !category_exists(conn, category_id).await? {
            errors.add("category_id", "Select a valid choice.");
        }
    }
    errors.into_result()?;

    let changes = UpdateProductEntity {
        name,
        description: body.description,
        price: body.price,
        stock: body.stock,
        image,
        available: body.available,
        category_id: body.category_id,
    };

    if changes.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    let product: ProductEntity = diesel::update(products::table.find(id))
        .set(changes)
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(product),
        message: Some("Updated product successfully"),
    })
}

/// Delete a product. Line items that reference it are deleted with it.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted product", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "No such product")
    )
)]
async fn delete_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let product: ProductEntity = diesel::delete(products::table.find(id))
        .returning(ProductEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Product #{} deleted", product.id);

    Ok(StdResponse {
        data: Some(product),
        message: Some("Deleted product successfully"),
    })
}

#[derive(Deserialize, Validate, ToSchema)]
struct ReduceStockReq {
    #[validate(range(min = 0, message = "Quantity cannot be negative."))]
    pub quantity: i32,
}

/// Take units out of stock.
#[utoipa::path(
    post,
    path = "/{id}/reduce-stock",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Product ID whose stock to reduce")
    ),
    request_body = ReduceStockReq,
    responses(
        (status = 200, description = "Reduced stock", body = StdResponse<ProductEntity, String>),
        (status = 404, description = "No such product"),
        (status = 422, description = "Negative quantity or stock out of range", body = StdResponse<FieldErrors, String>)
    )
)]
async fn reduce_product_stock(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<ReduceStockReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    body.validate()?;

    let product = reduce_stock(conn, id, body.quantity).await?;

    if product.stock < 0 {
        tracing::warn!("Product #{} stock is now negative ({})", product.id, product.stock);
    }

    Ok(StdResponse {
        data: Some(product),
        message: Some("Reduced stock successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_stock_quantity_cannot_be_negative() {
        assert!(ReduceStockReq { quantity: -1 }.validate().is_err());
        assert!(ReduceStockReq { quantity: 0 }.validate().is_ok());
        assert!(ReduceStockReq { quantity: i32::MAX }.validate().is_ok());
    }
}
