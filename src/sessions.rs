//! Server-side login sessions.
//!
//! A session row is keyed by the opaque bearer token handed out at login and
//! holds the shopping cart. Logging out deletes the row, cart included.

use chrono::{Duration, Utc};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    cart::Cart,
    core::config::SessionConfig,
    models::{CreateSessionEntity, SessionEntity, UserEntity},
    schema::{sessions, users},
};

/// The authenticated caller, resolved from the bearer token by the auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSession {
    pub session_id: Uuid,
    pub user_id: i32,
    pub is_staff: bool,
}

/// Opens a fresh session for `user_id` and drops that user's expired ones.
pub async fn open(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    config: &SessionConfig,
) -> QueryResult<SessionEntity> {
    diesel::delete(
        sessions::table
            .filter(sessions::user_id.eq(user_id))
            .filter(sessions::expires_at.le(diesel::dsl::now)),
    )
    .execute(conn)
    .await?;

    diesel::insert_into(sessions::table)
        .values(CreateSessionEntity {
            id: Uuid::new_v4(),
            user_id,
            expires_at: Utc::now() + Duration::hours(config.ttl_hours),
        })
        .returning(SessionEntity::as_returning())
        .get_result(conn)
        .await
}

/// Looks up an unexpired session whose user is still active.
pub async fn find_active(
    conn: &mut AsyncPgConnection,
    token: Uuid,
) -> QueryResult<Option<CurrentSession>> {
    let row: Option<(Uuid, i32, bool)> = sessions::table
        .inner_join(users::table)
        .filter(sessions::id.eq(token))
        .filter(sessions::expires_at.gt(diesel::dsl::now))
        .filter(users::is_active.eq(true))
        .select((sessions::id, users::id, users::is_staff))
        .first(conn)
        .await
        .optional()?;

    Ok(row.map(|(session_id, user_id, is_staff)| CurrentSession {
        session_id,
        user_id,
        is_staff,
    }))
}

pub async fn load_cart(conn: &mut AsyncPgConnection, session_id: Uuid) -> QueryResult<Cart> {
    let value: Value = sessions::table
        .find(session_id)
        .select(sessions::cart)
        .get_result(conn)
        .await?;

    Ok(Cart::from_value(value))
}

pub async fn save_cart(
    conn: &mut AsyncPgConnection,
    session_id: Uuid,
    cart: &Cart,
) -> QueryResult<()> {
    diesel::update(sessions::table.find(session_id))
        .set(sessions::cart.eq(cart.to_value()))
        .execute(conn)
        .await?;

    Ok(())
}

/// Deletes the session, returning whether it existed.
pub async fn close(conn: &mut AsyncPgConnection, session_id: Uuid) -> QueryResult<bool> {
    let deleted = diesel::delete(sessions::table.find(session_id))
        .execute(conn)
        .await?;

    Ok(deleted > 0)
}

pub async fn user(conn: &mut AsyncPgConnection, user_id: i32) -> QueryResult<UserEntity> {
    users::table
        .find(user_id)
        .select(UserEntity::as_select())
        .get_result(conn)
        .await
}
