use crate::core::{aliases::DbPool, config::SessionConfig};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub session: SessionConfig,
}
