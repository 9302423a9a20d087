use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    core::{app_error::AppError, app_state::AppState},
    sessions::{self, CurrentSession},
};

/// Extracts the session token from `Authorization: Bearer <uuid>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    Uuid::parse_str(token).ok()
}

async fn resolve_session(state: &AppState, headers: &HeaderMap) -> Result<CurrentSession, AppError> {
    let token = bearer_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Login required".into()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    sessions::find_active(conn, token)
        .await
        .context("Failed to look up session")?
        .ok_or_else(|| AppError::Unauthorized("Session expired or invalid, please log in again".into()))
}

/// Requires a logged-in customer and exposes it to handlers as `Extension<CurrentSession>`.
pub async fn customers_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = resolve_session(&state, req.headers()).await?;
    tracing::debug!("Authorized user #{}", session.user_id);

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

/// Like [`customers_authorization`], restricted to staff accounts.
pub async fn staff_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = resolve_session(&state, req.headers()).await?;

    if !session.is_staff {
        tracing::warn!("User #{} tried to reach the back office", session.user_id);
        return Err(AppError::ForbiddenResource("Staff access required".into()));
    }

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn reads_a_bearer_uuid() {
        let token = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        assert_eq!(bearer_token(&headers), Some(token));
    }

    #[test]
    fn ignores_missing_or_malformed_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert_eq!(bearer_token(&headers), None);
    }
}
