use anyhow::Context;
use axum::{Extension, extract::State, response::IntoResponse};
use diesel::{ExpressionMethods, QueryDsl};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::UserProfile,
    schema::orders,
    sessions::{self, CurrentSession},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/account",
        OpenApiRouter::new().routes(utoipa_axum::routes!(get_account)),
    )
}

#[derive(Serialize, ToSchema)]
struct GetAccountRes {
    pub user: UserProfile,
    pub order_count: i64,
}

/// The logged-in customer's profile.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Account"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get account successfully", body = StdResponse<GetAccountRes, String>),
        (status = 401, description = "Not logged in")
    )
)]
async fn get_account(
    State(state): State<AppState>,
    Extension(session): Extension<CurrentSession>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user = sessions::user(conn, session.user_id).await?;

    let order_count: i64 = orders::table
        .filter(orders::user_id.eq(session.user_id))
        .count()
        .get_result(conn)
        .await
        .context("Failed to count orders")?;

    Ok(StdResponse {
        data: Some(GetAccountRes {
            user: user.into(),
            order_count,
        }),
        message: Some("Get account successfully"),
    })
}
