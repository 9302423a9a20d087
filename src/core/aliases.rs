use diesel_async::{AsyncPgConnection, pooled_connection::AsyncDieselConnectionManager};

pub type DieselError = diesel::result::Error;

pub type DbPool = diesel_async::pooled_connection::bb8::Pool<AsyncPgConnection>;

pub type DbConnectionManager = AsyncDieselConnectionManager<AsyncPgConnection>;
