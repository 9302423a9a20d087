use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, PgTextExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use validator::Validate;

use crate::{
    core::{
        app_error::{AppError, FieldErrors, StdResponse},
        app_state::AppState,
    },
    models::{CategoryEntity, CreateCategoryEntity},
    routes::admin::search_term,
    schema::categories,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/categories",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_categories))
            .routes(utoipa_axum::routes!(create_category))
            .routes(utoipa_axum::routes!(update_category))
            .routes(utoipa_axum::routes!(delete_category)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct SearchQuery {
    /// Case-insensitive search on the name.
    q: Option<String>,
}

#[derive(Deserialize, Validate, ToSchema)]
struct CategoryReq {
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Enter between 1 and 50 characters."))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryReq {
    fn clean(self) -> Result<CreateCategoryEntity, AppError> {
        let req = CategoryReq {
            name: self.name.trim().to_string(),
            description: self.description.trim().to_string(),
        };
        req.validate()?;
        Ok(CreateCategoryEntity {
            name: req.name,
            description: req.description,
        })
    }
}

/// List categories.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "List categories", body = StdResponse<Vec<CategoryEntity>, String>)
    )
)]
async fn get_categories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut statement = categories::table.order_by(categories::name.asc()).into_boxed();
    if let Some(pattern) = search_term(query.q.as_deref()) {
        statement = statement.filter(categories::name.ilike(pattern));
    }

    let categories: Vec<CategoryEntity> = statement
        .select(CategoryEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get categories")?;

    Ok(StdResponse {
        data: Some(categories),
        message: Some("Get categories successfully"),
    })
}

/// Create a category.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Created category", body = StdResponse<CategoryEntity, String>),
        (status = 422, description = "Invalid form", body = StdResponse<FieldErrors, String>)
    )
)]
async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let values = body.clean()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::insert_into(categories::table)
        .values(values)
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create category")?;

    tracing::info!("Category #{} '{}' created", category.id, category.name);

    Ok(StdResponse {
        data: Some(category),
        message: Some("Created category successfully"),
    })
}

/// Replace a category's name and description.
#[utoipa::path(
    put,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID to update")
    ),
    request_body = CategoryReq,
    responses(
        (status = 200, description = "Updated category", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "No such category")
    )
)]
async fn update_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
    Json(body): Json<CategoryReq>,
) -> Result<impl IntoResponse, AppError> {
    let values = body.clean()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::update(categories::table.find(id))
        .set((
            categories::name.eq(values.name),
            categories::description.eq(values.description),
        ))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(category),
        message: Some("Updated category successfully"),
    })
}

/// Delete a category together with its products.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Category ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted category", body = StdResponse<CategoryEntity, String>),
        (status = 404, description = "No such category")
    )
)]
async fn delete_category(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let category: CategoryEntity = diesel::delete(categories::table.find(id))
        .returning(CategoryEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Category #{} deleted", category.id);

    Ok(StdResponse {
        data: Some(category),
        message: Some("Deleted category successfully"),
    })
}
