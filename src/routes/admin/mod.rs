//! Staff back office: maintenance of the catalog, orders, addresses and coupons.

pub mod addresses;
pub mod categories;
pub mod coupons;
pub mod orders;
pub mod products;

use bigdecimal::BigDecimal;
use utoipa_axum::router::OpenApiRouter;

use crate::core::{app_error::FieldErrors, app_state::AppState, middleware};

pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest(
            "/admin",
            OpenApiRouter::new()
                .merge(categories::routes_with_openapi())
                .merge(products::routes_with_openapi())
                .merge(orders::routes_with_openapi())
                .merge(addresses::routes_with_openapi())
                .merge(coupons::routes_with_openapi()),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::staff_authorization,
        ))
}

/// `ILIKE` pattern matching `term` anywhere, with the pattern metacharacters escaped.
pub fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Trimmed, non-empty search term.
pub fn search_term(q: Option<&str>) -> Option<String> {
    q.map(str::trim)
        .filter(|term| !term.is_empty())
        .map(contains_pattern)
}

/// Checks a decimal against a `NUMERIC(max_digits, decimal_places)` column.
pub fn check_decimal(
    errors: &mut FieldErrors,
    field: &str,
    value: &BigDecimal,
    max_digits: i64,
    decimal_places: i64,
) {
    let (digits, exponent) = value.normalized().as_bigint_and_exponent();
    let total_digits = digits.to_string().trim_start_matches('-').len() as i64;
    let (whole_digits, scale) = if exponent <= 0 {
        (total_digits - exponent, 0)
    } else {
        ((total_digits - exponent).max(0), exponent)
    };

    if scale > decimal_places {
        errors.add(
            field,
            format!("Ensure that there are no more than {decimal_places} decimal places."),
        );
    }
    if whole_digits > max_digits - decimal_places {
        errors.add(
            field,
            format!(
                "Ensure that there are no more than {} digits before the decimal point.",
                max_digits - decimal_places
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_terms_are_escaped_and_wrapped() {
        assert_eq!(search_term(Some("  café ")), Some("%café%".to_string()));
        assert_eq!(search_term(Some("50%_off")), Some("%50\\%\\_off%".to_string()));
        assert_eq!(search_term(Some("   ")), None);
        assert_eq!(search_term(None), None);
    }

    fn decimal_errors(raw: &str, max_digits: i64, places: i64) -> FieldErrors {
        let mut errors = FieldErrors::new();
        check_decimal(&mut errors, "price", &raw.parse().unwrap(), max_digits, places);
        errors
    }

    #[test]
    fn decimals_that_fit_the_column_pass() {
        assert!(decimal_errors("12345678.90", 10, 2).is_empty());
        assert!(decimal_errors("0.5", 10, 2).is_empty());
        assert!(decimal_errors("100", 5, 2).is_empty());
        assert!(decimal_errors("-3.10", 10, 2).is_empty());
    }

    #[test]
    fn decimals_that_overflow_the_column_fail() {
        assert!(decimal_errors("1.999", 10, 2).get("price").is_some());
        assert!(decimal_errors("123456789", 10, 2).get("price").is_some());
        assert!(decimal_errors("1000", 5, 2).get("price").is_some());
    }
}
