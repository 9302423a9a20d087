use anyhow::Context;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use diesel::{ExpressionMethods, PgTextExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;

use crate::{
    core::{
        app_error::{AppError, FieldErrors, NON_FIELD_ERRORS, StdResponse},
        app_state::AppState,
    },
    models::{CouponEntity, CreateCouponEntity},
    routes::admin::{check_decimal, search_term},
    schema::coupons,
};

pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/coupons",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_coupons))
            .routes(utoipa_axum::routes!(create_coupon))
            .routes(utoipa_axum::routes!(delete_coupon)),
    )
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct CouponsQuery {
    /// Case-insensitive search on the code.
    q: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CouponRow {
    #[serde(flatten)]
    pub coupon: CouponEntity,
    pub is_valid_today: bool,
}

/// List coupons.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(CouponsQuery),
    responses(
        (status = 200, description = "List coupons", body = StdResponse<Vec<CouponRow>, String>)
    )
)]
async fn get_coupons(
    State(state): State<AppState>,
    Query(query): Query<CouponsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut statement = coupons::table.order_by(coupons::valid_until.desc()).into_boxed();
    if let Some(pattern) = search_term(query.q.as_deref()) {
        statement = statement.filter(coupons::code.ilike(pattern));
    }

    let coupons: Vec<CouponEntity> = statement
        .select(CouponEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get coupons")?;

    let today = Utc::now().date_naive();
    let rows: Vec<CouponRow> = coupons
        .into_iter()
        .map(|coupon| CouponRow {
            is_valid_today: coupon.is_valid_on(today),
            coupon,
        })
        .collect();

    Ok(StdResponse {
        data: Some(rows),
        message: Some("Get coupons successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct CreateCouponReq {
    pub code: String,
    /// Percentage between 0 and 100.
    #[schema(value_type = String, example = "15.00")]
    pub discount: BigDecimal,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

impl CreateCouponReq {
    fn clean(self) -> Result<CreateCouponEntity, AppError> {
        let code = self.code.trim().to_string();
        let mut errors = FieldErrors::new();

        if code.is_empty() {
            errors.add("code", "This field is required.");
        } else if code.chars().count() > 50 {
            errors.add("code", "Ensure this value has at most 50 characters.");
        }

        if self.discount < BigDecimal::from(0) || self.discount > BigDecimal::from(100) {
            errors.add("discount", "Ensure this value is between 0 and 100.");
        } else {
            check_decimal(&mut errors, "discount", &self.discount, 5, 2);
        }

        if self.valid_from > self.valid_until {
            errors.add(
                NON_FIELD_ERRORS,
                "The coupon cannot expire before it becomes valid.",
            );
        }

        errors.into_result()?;
        Ok(CreateCouponEntity {
            code,
            discount: self.discount,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
        })
    }
}

/// Create a coupon. Codes are unique.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    request_body = CreateCouponReq,
    responses(
        (status = 200, description = "Created coupon", body = StdResponse<CouponEntity, String>),
        (status = 409, description = "Code already in use"),
        (status = 422, description = "Invalid form", body = StdResponse<FieldErrors, String>)
    )
)]
async fn create_coupon(
    State(state): State<AppState>,
    Json(body): Json<CreateCouponReq>,
) -> Result<impl IntoResponse, AppError> {
    let values = body.clean()?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let coupon: CouponEntity = diesel::insert_into(coupons::table)
        .values(values)
        .returning(CouponEntity::as_returning())
        .get_result(conn)
        .await?;

    tracing::info!("Coupon '{}' created", coupon.code);

    Ok(StdResponse {
        data: Some(coupon),
        message: Some("Created coupon successfully"),
    })
}

/// Delete a coupon.
#[utoipa::path(
    delete,
    path = "/{id}",
    tags = ["Admin"],
    security(("bearerAuth" = [])),
    params(
        ("id" = i32, Path, description = "Coupon ID to delete")
    ),
    responses(
        (status = 200, description = "Deleted coupon", body = StdResponse<CouponEntity, String>),
        (status = 404, description = "No such coupon")
    )
)]
async fn delete_coupon(
    Path(id): Path<i32>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let coupon: CouponEntity = diesel::delete(coupons::table.find(id))
        .returning(CouponEntity::as_returning())
        .get_result(conn)
        .await?;

    Ok(StdResponse {
        data: Some(coupon),
        message: Some("Deleted coupon successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(code: &str, discount: &str, from: (i32, u32, u32), until: (i32, u32, u32)) -> CreateCouponReq {
        CreateCouponReq {
            code: code.into(),
            discount: discount.parse().unwrap(),
            valid_from: NaiveDate::from_ymd_opt(from.0, from.1, from.2).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(until.0, until.1, until.2).unwrap(),
        }
    }

    fn field_errors(result: Result<CreateCouponEntity, AppError>) -> FieldErrors {
        match result {
            Err(AppError::Validation(errors)) => errors,
            other => panic!("expected validation errors, got {other:?}"),
        }
    }

    #[test]
    fn valid_coupon_is_trimmed() {
        let coupon = request("  VERANO ", "15.50", (2025, 1, 1), (2025, 1, 1))
            .clean()
            .unwrap();
        assert_eq!(coupon.code, "VERANO");
    }

    #[test]
    fn discount_must_be_a_percentage() {
        let errors = field_errors(request("X", "100.01", (2025, 1, 1), (2025, 2, 1)).clean());
        assert!(errors.get("discount").is_some());

        let errors = field_errors(request("X", "-1", (2025, 1, 1), (2025, 2, 1)).clean());
        assert!(errors.get("discount").is_some());

        assert!(request("X", "100", (2025, 1, 1), (2025, 2, 1)).clean().is_ok());
    }

    #[test]
    fn validity_window_cannot_be_inverted() {
        let errors = field_errors(request("X", "5", (2025, 2, 1), (2025, 1, 1)).clean());
        assert!(errors.get(NON_FIELD_ERRORS).is_some());
    }
}
