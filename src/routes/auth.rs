use anyhow::Context;
use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    core::{
        app_error::{AppError, FieldErrors, StdResponse},
        app_state::AppState,
        middleware::bearer_token,
    },
    forms::{EMAIL_TAKEN, LoginForm, RegistrationForm, USERNAME_TAKEN},
    models::{CreateUserEntity, UserEntity, UserProfile},
    schema::users,
    sessions,
};

const INVALID_CREDENTIALS: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

/// Registration, login and logout. None of these require an existing session.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/auth",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(register))
            .routes(utoipa_axum::routes!(login))
            .routes(utoipa_axum::routes!(logout)),
    )
}

#[derive(Serialize, ToSchema)]
pub struct AuthRes {
    /// Bearer token for `Authorization: Bearer <token>`.
    pub token: Uuid,
    pub user: UserProfile,
    /// Where the client should go next.
    pub next: String,
}

async fn hash_password(password: String) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, bcrypt::DEFAULT_COST))
        .await
        .context("Password hashing task failed")?
        .context("Failed to hash password")?;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .context("Password verification task failed")?
        .unwrap_or(false);
    Ok(valid)
}

/// Only same-site absolute paths are accepted as a post-login target.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

/// Create an account and log it in.
#[utoipa::path(
    post,
    path = "/register",
    tags = ["Auth"],
    request_body = RegistrationForm,
    responses(
        (status = 200, description = "Registered and logged in", body = StdResponse<AuthRes, String>),
        (status = 422, description = "Invalid form", body = StdResponse<FieldErrors, String>)
    )
)]
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegistrationForm>,
) -> Result<impl IntoResponse, AppError> {
    let form = body.clean().map_err(AppError::Validation)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut errors = FieldErrors::new();

    let email_taken: i64 = users::table
        .filter(users::email.eq(&form.email))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check email")?;
    if email_taken > 0 {
        errors.add("email", EMAIL_TAKEN);
    }

    let username_taken: i64 = users::table
        .filter(users::username.eq(&form.username))
        .count()
        .get_result(conn)
        .await
        .context("Failed to check username")?;
    if username_taken > 0 {
        errors.add("username", USERNAME_TAKEN);
    }

    errors.into_result()?;

    let password_hash = hash_password(form.password).await?;
    let session_config = state.session.clone();

    let (user, session) = conn
        .transaction(move |conn| {
            Box::pin(async move {
                let user: UserEntity = diesel::insert_into(users::table)
                    .values(CreateUserEntity {
                        username: form.username,
                        email: form.email,
                        password_hash,
                    })
                    .returning(UserEntity::as_returning())
                    .get_result(conn)
                    .await?;

                let session = sessions::open(conn, user.id, &session_config).await?;

                Ok::<_, AppError>((user, session))
            })
        })
        .await?;

    tracing::info!("Registered user #{} ({})", user.id, user.username);

    Ok(StdResponse {
        data: Some(AuthRes {
            token: session.id,
            user: user.into(),
            next: "/".into(),
        }),
        message: Some("Registered successfully"),
    })
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct LoginQuery {
    /// Path to return to after logging in.
    next: Option<String>,
}

/// Log in with username and password.
#[utoipa::path(
    post,
    path = "/login",
    tags = ["Auth"],
    params(LoginQuery),
    request_body = LoginForm,
    responses(
        (status = 200, description = "Logged in", body = StdResponse<AuthRes, String>),
        (status = 401, description = "Wrong credentials or inactive account"),
        (status = 422, description = "Missing fields", body = StdResponse<FieldErrors, String>)
    )
)]
async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    Json(body): Json<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let form = body.clean().map_err(AppError::Validation)?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let user: Option<UserEntity> = users::table
        .filter(users::username.eq(&form.username))
        .select(UserEntity::as_select())
        .first(conn)
        .await
        .optional()
        .context("Failed to look up user")?;

    let Some(user) = user else {
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    if !verify_password(form.password, user.password_hash.clone()).await? || !user.is_active {
        tracing::info!("Rejected login for {}", form.username);
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let session = sessions::open(conn, user.id, &state.session)
        .await
        .context("Failed to open session")?;

    tracing::info!("User #{} logged in", user.id);

    Ok(StdResponse {
        data: Some(AuthRes {
            token: session.id,
            user: user.into(),
            next: safe_next(query.next.as_deref()),
        }),
        message: Some("Logged in successfully"),
    })
}

/// End the current session. The cart held by it is discarded.
#[utoipa::path(
    post,
    path = "/logout",
    tags = ["Auth"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Logged out", body = StdResponse<String, String>)
    )
)]
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = bearer_token(&headers) {
        let conn = &mut state
            .db_pool
            .get()
            .await
            .context("Failed to obtain a DB connection pool")?;

        if sessions::close(conn, token)
            .await
            .context("Failed to close session")?
        {
            tracing::info!("Session {} closed", token);
        }
    }

    Ok(StdResponse::<String, _> {
        data: None,
        message: Some("Logged out successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_defaults_to_home() {
        assert_eq!(safe_next(None), "/");
        assert_eq!(safe_next(Some("")), "/");
    }

    #[test]
    fn next_keeps_local_paths_only() {
        assert_eq!(safe_next(Some("/cart")), "/cart");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
    }
}
