//! Notification routes: extraction, listing, manual edits, and recovery.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono_tz::Tz;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::errors::{ApiResponse, AppError};
use crate::models::history::NotificationHistory;
use crate::models::notification::{
    ExtractRequest, NotificationFilters, NotificationRecord, UpdateNotificationRequest,
};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::{lifecycle, notification};
use crate::AppState;

/// Response body for the extract endpoint.
#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleAllResponse {
    pub scheduled: usize,
}

#[derive(Debug, Serialize)]
pub struct CancelAllResponse {
    pub cancelled: usize,
}

/// POST /api/v1/users/:user_id/notifications/extract — re-extract a diet.
pub async fn extract(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<ExtractRequest>,
) -> Result<Json<ApiResponse<ExtractResponse>>, AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let zone = body
        .timezone
        .as_deref()
        .unwrap_or(&state.config.default_timezone);
    let tz: Tz = zone
        .parse()
        .map_err(|_| AppError::Validation(format!("Unknown timezone '{zone}'")))?;

    let records = lifecycle::re_extract(
        &state.db,
        state.delivery.as_ref(),
        user_id,
        &body.diet_text,
        tz,
    )
    .await?;

    Ok(ApiResponse::success(ExtractResponse { records }))
}

/// GET /api/v1/users/:user_id/notifications — list records.
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
    Query(filters): Query<NotificationFilters>,
) -> Result<Json<ApiResponse<PagedResult<NotificationRecord>>>, AppError> {
    let result = notification::list(&state.db, user_id, &filters, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// PUT /api/v1/users/:user_id/notifications/:id — manual edit.
pub async fn update(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateNotificationRequest>,
) -> Result<Json<ApiResponse<NotificationRecord>>, AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let record =
        notification::update(&state.db, state.delivery.as_ref(), user_id, id, &body).await?;
    Ok(ApiResponse::success(record))
}

/// GET /api/v1/users/:user_id/notifications/:id/history — lifecycle trail.
pub async fn history(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Vec<NotificationHistory>>>, AppError> {
    let entries = notification::list_history(&state.db, user_id, id).await?;
    Ok(ApiResponse::success(entries))
}

/// DELETE /api/v1/users/:user_id/notifications/:id — hard delete.
pub async fn remove(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    notification::remove(&state.db, state.delivery.as_ref(), user_id, id).await?;
    Ok(ApiResponse::success(()))
}

/// POST /api/v1/users/:user_id/notifications/schedule-all — re-arm delivery.
pub async fn schedule_all(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ScheduleAllResponse>>, AppError> {
    let scheduled =
        lifecycle::schedule_all(&state.db, state.delivery.as_ref(), user_id).await?;
    Ok(ApiResponse::success(ScheduleAllResponse { scheduled }))
}

/// POST /api/v1/users/:user_id/notifications/cancel-all — disarm delivery.
pub async fn cancel_all(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CancelAllResponse>>, AppError> {
    let cancelled = lifecycle::cancel_all(&state.db, state.delivery.as_ref(), user_id).await?;
    Ok(ApiResponse::success(CancelAllResponse { cancelled }))
}
