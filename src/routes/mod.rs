pub mod admin;
pub mod auth;
pub mod catalog;
pub mod customers;

use utoipa_axum::router::OpenApiRouter;

use crate::core::app_state::AppState;

/// Public catalog and auth routes, the customer area and the staff back office.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(catalog::routes_with_openapi())
        .merge(auth::routes_with_openapi())
        .merge(customers::routes_with_openapi(state))
        .merge(admin::routes_with_openapi(state))
}
