pub mod cart;
pub mod core;
pub mod forms;
pub mod models;
pub mod orders;
pub mod pagination;
pub mod routes;
pub mod schema;
pub mod sessions;
