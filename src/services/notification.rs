//! Notification record queries and manual edits.
//!
//! Manual edits transfer ownership: an edited record becomes `Manual` origin
//! with `Device` authority, so the extraction pipeline never sweeps it and
//! the server sweep stops dispatching it.

use std::collections::BTreeSet;

use chrono::{NaiveTime, Timelike, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::history::{actions, NotificationHistory};
use crate::models::notification::{
    encode_days, hhmm, Authority, DaySource, NotificationFilters, NotificationRecord, Origin,
    UpdateNotificationRequest,
};
use crate::models::pagination::{PagedResult, Pagination};
use crate::services::delivery::DeliveryAdapter;
use crate::services::{fingerprint, history, schedule};

/// Parse an "HH:MM" wall-clock string from an update payload.
pub fn parse_time_hhmm(value: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(value, hhmm::FORMAT)
        .map_err(|_| AppError::Validation(format!("Invalid time '{value}', expected HH:MM")))
}

/// Validate a weekday list from an update payload.
pub fn validate_days(days: &[u8]) -> Result<BTreeSet<u8>, AppError> {
    if days.is_empty() {
        return Err(AppError::Validation(
            "selected_days must not be empty".to_string(),
        ));
    }
    if let Some(bad) = days.iter().find(|&&d| d > 6) {
        return Err(AppError::Validation(format!(
            "Invalid weekday {bad}, expected 0 (Monday) through 6 (Sunday)"
        )));
    }
    Ok(days.iter().copied().collect())
}

/// List a user's records with pagination; active-only unless asked otherwise.
pub async fn list(
    pool: &PgPool,
    user_id: Uuid,
    filters: &NotificationFilters,
    pagination: &Pagination,
) -> Result<PagedResult<NotificationRecord>, AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM diet_notifications WHERE user_id = $1 AND (is_active OR $2)",
    )
    .bind(user_id)
    .bind(filters.include_inactive)
    .fetch_one(pool)
    .await?;

    let records = sqlx::query_as::<_, NotificationRecord>(
        r#"
        SELECT * FROM diet_notifications
        WHERE user_id = $1 AND (is_active OR $2)
        ORDER BY fire_time ASC, created_at ASC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(filters.include_inactive)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    Ok(PagedResult::new(records, total, pagination))
}

/// Fetch one record scoped to its owner.
pub async fn get(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<NotificationRecord, AppError> {
    sqlx::query_as::<_, NotificationRecord>(
        "SELECT * FROM diet_notifications WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}

/// Apply a manual edit to a record.
pub async fn update(
    pool: &PgPool,
    delivery: &dyn DeliveryAdapter,
    user_id: Uuid,
    id: Uuid,
    request: &UpdateNotificationRequest,
) -> Result<NotificationRecord, AppError> {
    let record = get(pool, user_id, id).await?;

    let message = request
        .message
        .clone()
        .unwrap_or_else(|| record.message.clone());
    let fire_time = match &request.time {
        Some(value) => parse_time_hhmm(value)?,
        None => record.fire_time,
    };
    let (days, day_source) = match &request.selected_days {
        Some(list) => (validate_days(list)?, DaySource::Explicit),
        None => (record.days(), record.day_source),
    };

    let new_fingerprint =
        fingerprint::compute_notification(fire_time.hour(), fire_time.minute(), &message);
    let tz = schedule::zone_or_utc(&record.timezone);
    let next_fire = schedule::next_occurrence_at(&days, fire_time, Utc::now(), tz)
        .map(|occ| occ.utc)
        .ok();

    let updated = sqlx::query_as::<_, NotificationRecord>(
        r#"
        UPDATE diet_notifications
        SET message = $1, fire_time = $2, selected_days = $3, day_source = $4,
            fingerprint = $5, origin = $6, authority = $7, next_fire_utc = $8,
            updated_at = NOW()
        WHERE id = $9 AND user_id = $10
        RETURNING *
        "#,
    )
    .bind(&message)
    .bind(fire_time)
    .bind(encode_days(&days))
    .bind(day_source)
    .bind(&new_fingerprint)
    .bind(Origin::Manual)
    .bind(Authority::Device)
    .bind(next_fire)
    .bind(id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    history::record(
        pool,
        id,
        user_id,
        actions::UPDATED,
        Some(serde_json::json!({
            "message_changed": request.message.is_some(),
            "time_changed": request.time.is_some(),
            "days_changed": request.selected_days.is_some(),
        })),
    )
    .await?;

    // Ownership moved to the device; release any server-armed trigger.
    if let Err(e) = delivery.cancel(id).await {
        tracing::warn!(record_id = %id, error = %e, "Delivery cancel failed after update");
    }

    Ok(updated)
}

/// Lifecycle trail for one record, newest first.
pub async fn list_history(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Vec<NotificationHistory>, AppError> {
    let entries = sqlx::query_as::<_, NotificationHistory>(
        r#"
        SELECT * FROM notification_history
        WHERE notification_id = $1 AND user_id = $2
        ORDER BY created_at DESC
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(entries)
}

/// Hard-delete a record. Only explicit user action reaches here; the
/// extraction pipeline itself never deletes, it deactivates.
pub async fn remove(
    pool: &PgPool,
    delivery: &dyn DeliveryAdapter,
    user_id: Uuid,
    id: Uuid,
) -> Result<(), AppError> {
    let deleted = sqlx::query_scalar::<_, Uuid>(
        "DELETE FROM diet_notifications WHERE id = $1 AND user_id = $2 RETURNING id",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    if deleted.is_none() {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    history::record(pool, id, user_id, actions::DELETED, None).await?;

    if let Err(e) = delivery.cancel(id).await {
        tracing::warn!(record_id = %id, error = %e, "Delivery cancel failed after delete");
    }

    Ok(())
}
