use std::{fmt, str::FromStr};

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Associations, Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Users & sessions

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Public view of a user; never carries the password hash.
#[derive(Serialize, Debug, ToSchema)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<UserEntity> for UserProfile {
    fn from(user: UserEntity) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Associations, Debug)]
#[diesel(belongs_to(UserEntity, foreign_key = user_id))]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionEntity {
    pub id: Uuid,
    pub user_id: i32,
    pub cart: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::sessions)]
pub struct CreateSessionEntity {
    pub id: Uuid,
    pub user_id: i32,
    pub expires_at: DateTime<Utc>,
}

// Catalog

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryEntity {
    pub id: i32,
    pub name: String,
    pub description: String,
}

#[derive(Insertable, Deserialize, Debug)]
#[diesel(table_name = crate::schema::categories)]
pub struct CreateCategoryEntity {
    pub name: String,
    pub description: String,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(CategoryEntity, foreign_key = category_id))]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i32,
    pub name: String,
    pub description: String,
    #[schema(value_type = String, example = "19.90")]
    pub price: BigDecimal,
    pub stock: i32,
    pub image: Option<String>,
    pub available: bool,
    pub category_id: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub name: String,
    pub description: String,
    pub price: BigDecimal,
    pub stock: i32,
    pub image: Option<String>,
    pub available: bool,
    pub category_id: i32,
}

#[derive(AsChangeset, Debug, Default)]
#[diesel(table_name = crate::schema::products)]
pub struct UpdateProductEntity {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<BigDecimal>,
    pub stock: Option<i32>,
    pub image: Option<Option<String>>,
    pub available: Option<bool>,
    pub category_id: Option<i32>,
}

impl UpdateProductEntity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.image.is_none()
            && self.available.is_none()
            && self.category_id.is_none()
    }
}

// Shipping addresses

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(UserEntity, foreign_key = user_id))]
#[diesel(table_name = crate::schema::shipping_addresses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ShippingAddressEntity {
    pub id: i32,
    pub user_id: i32,
    pub first_names: String,
    pub last_names: Option<String>,
    pub phone: String,
    pub national_id: String,
    pub address: String,
    pub city: String,
    pub district: String,
    pub country: String,
    pub email: String,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::shipping_addresses)]
pub struct CreateShippingAddressEntity {
    pub user_id: i32,
    pub first_names: String,
    pub last_names: Option<String>,
    pub phone: String,
    pub national_id: String,
    pub address: String,
    pub city: String,
    pub district: String,
    pub country: String,
    pub email: String,
}

// Orders

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Espera,
    Aceptado,
    EnCamino,
    Cancelado,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Espera,
        OrderStatus::Aceptado,
        OrderStatus::EnCamino,
        OrderStatus::Cancelado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Espera => "espera",
            OrderStatus::Aceptado => "aceptado",
            OrderStatus::EnCamino => "en_camino",
            OrderStatus::Cancelado => "cancelado",
        }
    }

    /// Human readable label, as shown to customers.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Espera => "En espera",
            OrderStatus::Aceptado => "Pedido aceptado",
            OrderStatus::EnCamino => "En camino",
            OrderStatus::Cancelado => "Cancelado",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("{s} is not a valid order status"))
    }
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(UserEntity, foreign_key = user_id))]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub shipping_address_id: Option<i32>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub user_id: i32,
    pub status: String,
    pub shipping_address_id: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Associations, Serialize, Debug, Clone, ToSchema)]
#[diesel(belongs_to(OrderEntity, foreign_key = order_id))]
#[diesel(table_name = crate::schema::line_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LineItemEntity {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::line_items)]
pub struct CreateLineItemEntity {
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
}

// Coupons

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::coupons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CouponEntity {
    pub id: i32,
    pub code: String,
    /// Discount percentage.
    #[schema(value_type = String, example = "15.00")]
    pub discount: BigDecimal,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

impl CouponEntity {
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_until
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::coupons)]
pub struct CreateCouponEntity {
    pub code: String,
    pub discount: BigDecimal,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_round_trips_through_its_column_value() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("entregado".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn order_status_serializes_like_the_column() {
        let json = serde_json::to_string(&OrderStatus::EnCamino).unwrap();
        assert_eq!(json, "\"en_camino\"");
    }

    #[test]
    fn coupon_validity_is_inclusive_on_both_ends() {
        let coupon = CouponEntity {
            id: 1,
            code: "VERANO".into(),
            discount: "10".parse().unwrap(),
            valid_from: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            valid_until: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
        };

        assert!(coupon.is_valid_on(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(coupon.is_valid_on(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()));
        assert!(!coupon.is_valid_on(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
        assert!(!coupon.is_valid_on(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }
}
