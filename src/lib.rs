pub mod config;
pub mod db;
pub mod errors;
pub mod extract;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::delivery::DeliveryAdapter;

/// Shared application state passed to all Axum handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: config::AppConfig,
    pub delivery: Arc<dyn DeliveryAdapter>,
}
