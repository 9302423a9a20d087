#![allow(dead_code)]

use std::{env, sync::OnceLock};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use diesel_async::RunQueryDsl;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tower::ServiceExt;
use uuid::Uuid;

use storefront::{
    core::{
        app_state::AppState,
        config::{DatabaseConfig, SessionConfig},
        db,
    },
    routes,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static TEST_DB_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn lazy_state(url: &str) -> AppState {
    AppState {
        db_pool: db::create_lazy_pool(&DatabaseConfig {
            url: url.to_string(),
            max_connections: 2,
        }),
        session: SessionConfig::default(),
    }
}

pub fn app(state: AppState) -> Router {
    let router: Router<AppState> = routes::routes_with_openapi(&state).into();
    router.with_state(state)
}

pub struct TestDb {
    pub state: AppState,
    _guard: MutexGuard<'static, ()>,
}

impl TestDb {
    pub fn app(&self) -> Router {
        app(self.state.clone())
    }

    pub async fn execute_sql(&self, sql: &str) {
        let conn = &mut self.state.db_pool.get().await.expect("db connection");
        diesel::sql_query(sql).execute(conn).await.expect("execute sql");
    }
}

/// Migrated, emptied test database, or `None` when `TEST_DATABASE_URL` is unset.
pub async fn init_test_db() -> Option<TestDb> {
    dotenvy::dotenv().ok();
    let Ok(url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return None;
    };

    let guard = TEST_DB_LOCK.get_or_init(|| Mutex::new(())).lock().await;

    db::run_migrations_blocking(MIGRATIONS, &url)
        .await
        .expect("run migrations");

    let db = TestDb {
        state: lazy_state(&url),
        _guard: guard,
    };
    db.execute_sql(
        "TRUNCATE line_items, orders, shipping_addresses, coupons, products, categories, sessions, users RESTART IDENTITY CASCADE",
    )
    .await;

    Some(db)
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("send request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Registers `username` and returns its session token.
pub async fn register(app: &Router, username: &str) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "s3cret-pass",
            "confirm_password": "s3cret-pass",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {body}");

    body["data"]["token"]
        .as_str()
        .and_then(|token| token.parse().ok())
        .expect("token in response")
}
