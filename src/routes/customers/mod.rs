pub mod account;
pub mod cart;
pub mod checkout;
pub mod orders;

use utoipa_axum::router::OpenApiRouter;

use crate::core::{app_state::AppState, middleware};

/// Every customer-facing route, behind the login check.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(cart::routes_with_openapi())
        .merge(checkout::routes_with_openapi())
        .merge(account::routes_with_openapi())
        .merge(orders::routes_with_openapi())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::customers_authorization,
        ))
}
