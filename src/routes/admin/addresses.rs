use anyhow::Context;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use diesel::{BoolExpressionMethods, ExpressionMethods, PgTextExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, StdResponse},
        app_state::AppState,
    },
    models::ShippingAddressEntity,
    routes::admin::search_term,
    schema::{shipping_addresses, users},
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/addresses",
        OpenApiRouter::new().routes(utoipa_axum::routes!(get_addresses)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct AddressesQuery {
    /// Case-insensitive search on the username and the street address.
    q: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminAddressRow {
    pub username: String,
    pub address: ShippingAddressEntity,
}

/// List shipping addresses with their owners.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(AddressesQuery),
    responses(
        (status = 200, description = "List shipping addresses", body = StdResponse<Vec<AdminAddressRow>, String>)
    )
)]
async fn get_addresses(
    State(state): State<AppState>,
    Query(query): Query<AddressesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut statement = shipping_addresses::table
        .inner_join(users::table)
        .order_by(shipping_addresses::id.desc())
        .into_boxed();
    if let Some(pattern) = search_term(query.q.as_deref()) {
        statement = statement.filter(
            users::username
                .ilike(pattern.clone())
                .or(shipping_addresses::address.ilike(pattern)),
        );
    }

    let rows: Vec<AdminAddressRow> = statement
        .select((ShippingAddressEntity::as_select(), users::username))
        .get_results::<(ShippingAddressEntity, String)>(conn)
        .await
        .context("Failed to get shipping addresses")?
        .into_iter()
        .map(|(address, username)| AdminAddressRow { username, address })
        .collect();

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Get shipping addresses successfully"),
    })
}
