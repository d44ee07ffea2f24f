//! Route definitions for the dietly API.

pub mod health;
pub mod notifications;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route(
            "/api/v1/users/{user_id}/notifications/extract",
            post(notifications::extract),
        )
        .route(
            "/api/v1/users/{user_id}/notifications",
            get(notifications::list),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/{id}",
            put(notifications::update).delete(notifications::remove),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/{id}/history",
            get(notifications::history),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/schedule-all",
            post(notifications::schedule_all),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/cancel-all",
            post(notifications::cancel_all),
        )
        .with_state(state)
}
