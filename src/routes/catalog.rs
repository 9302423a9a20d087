use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper, pg::Pg};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::{CategoryEntity, ProductEntity},
    pagination::{CATALOG_PAGE_SIZE, Page, PageWindow},
    schema::{categories, products},
};

/// Number of products on the home page.
const FEATURED_PRODUCTS: i64 = 4;

/// Public catalog routes: home page, product listing and product detail.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(home))
        .nest(
            "/products",
            OpenApiRouter::new()
                .routes(utoipa_axum::routes!(list_products))
                .routes(utoipa_axum::routes!(get_product)),
        )
}

/// Featured products for the landing page.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Catalog"],
    responses(
        (status = 200, description = "Featured products", body = StdResponse<Vec<ProductEntity>, String>)
    )
)]
async fn home(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let featured: Vec<ProductEntity> = products::table
        .filter(products::available.eq(true))
        .order_by(products::id.asc())
        .limit(FEATURED_PRODUCTS)
        .select(ProductEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get featured products")?;

    Ok(StdResponse {
        data: Some(featured),
        message: Some("Get featured products successfully"),
    })
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    /// Exact category name.
    #[serde(rename = "categoria")]
    pub category: Option<String>,
    /// Maximum unit price, inclusive.
    #[serde(rename = "precio")]
    pub max_price: Option<String>,
    /// Page number; invalid values fall back to the first or last page.
    pub page: Option<String>,
}

/// Validated catalog filters.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CatalogFilter {
    pub category: Option<String>,
    pub max_price: Option<BigDecimal>,
}

impl CatalogFilter {
    pub fn from_query(query: &ProductListQuery) -> Result<Self, AppError> {
        let category = query
            .category
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let max_price = match query
            .max_price
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
        {
            Some(raw) => Some(raw.parse::<BigDecimal>().map_err(|_| {
                AppError::BadRequest(format!("precio must be a decimal number, got '{raw}'"))
            })?),
            None => None,
        };

        Ok(Self {
            category,
            max_price,
        })
    }

    fn apply(&self) -> products::BoxedQuery<'static, Pg> {
        let mut query = products::table
            .filter(products::available.eq(true))
            .into_boxed();

        if let Some(name) = &self.category {
            query = query.filter(
                products::category_id.eq_any(
                    categories::table
                        .filter(categories::name.eq(name.clone()))
                        .select(categories::id),
                ),
            );
        }

        if let Some(max_price) = &self.max_price {
            query = query.filter(products::price.le(max_price.clone()));
        }

        query
    }
}

/// Available products, optionally filtered by category name and maximum price, 12 per page.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Catalog"],
    params(ProductListQuery),
    responses(
        (status = 200, description = "One page of products", body = StdResponse<Page<ProductEntity>, String>),
        (status = 400, description = "precio is not a number")
    )
)]
async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = CatalogFilter::from_query(&query)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let count: i64 = filter
        .apply()
        .count()
        .get_result(conn)
        .await
        .context("Failed to count products")?;

    let window = PageWindow::resolve(query.page.as_deref(), count, CATALOG_PAGE_SIZE);

    let items: Vec<ProductEntity> = filter
        .apply()
        .order_by(products::id.asc())
        .offset(window.offset())
        .limit(window.limit())
        .select(ProductEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get products")?;

    Ok(StdResponse {
        data: Some(window.into_page(items)),
        message: Some("Get products successfully"),
    })
}

#[derive(Serialize, ToSchema)]
struct GetProductRes {
    pub product: ProductEntity,
    pub category: CategoryEntity,
}

/// Product detail with its category.
#[utoipa::path(
    get,
    path = "/{id}",
    tags = ["Catalog"],
    params(
        ("id" = i32, Path, description = "Product ID to fetch")
    ),
    responses(
        (status = 200, description = "Get product successfully", body = StdResponse<GetProductRes, String>),
        (status = 404, description = "No such product")
    )
)]
async fn get_product(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let (product, category): (ProductEntity, CategoryEntity) = products::table
        .inner_join(categories::table)
        .filter(products::id.eq(id))
        .select((ProductEntity::as_select(), CategoryEntity::as_select()))
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(GetProductRes { product, category }),
        message: Some("Get product successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(category: Option<&str>, max_price: Option<&str>) -> ProductListQuery {
        ProductListQuery {
            category: category.map(str::to_string),
            max_price: max_price.map(str::to_string),
            page: None,
        }
    }

    #[test]
    fn blank_filters_are_ignored() {
        let filter = CatalogFilter::from_query(&query(Some("  "), Some(""))).unwrap();
        assert_eq!(filter, CatalogFilter::default());
    }

    #[test]
    fn price_filter_parses_decimals() {
        let filter = CatalogFilter::from_query(&query(Some("Café"), Some("25.50"))).unwrap();
        assert_eq!(filter.category.as_deref(), Some("Café"));
        assert_eq!(filter.max_price, Some("25.50".parse().unwrap()));
    }

    #[test]
    fn non_numeric_price_is_a_bad_request() {
        let err = CatalogFilter::from_query(&query(None, Some("barato"))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn query_uses_the_storefront_parameter_names() {
        let query: ProductListQuery =
            serde_json::from_value(serde_json::json!({ "categoria": "Té", "precio": "9", "page": "2" }))
                .unwrap();
        assert_eq!(query.category.as_deref(), Some("Té"));
        assert_eq!(query.max_price.as_deref(), Some("9"));
        assert_eq!(query.page.as_deref(), Some("2"));
    }
}
