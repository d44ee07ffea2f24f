//! Writing the notification lifecycle audit trail.

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::errors::AppError;

/// Insert one history entry. Accepts any executor so callers can write
/// inside an open transaction or straight against the pool.
pub async fn record<'e, E>(
    executor: E,
    notification_id: Uuid,
    user_id: Uuid,
    action: &str,
    detail: Option<serde_json::Value>,
) -> Result<(), AppError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO notification_history (notification_id, user_id, action, detail)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(notification_id)
    .bind(user_id)
    .bind(action)
    .bind(detail)
    .execute(executor)
    .await?;
    Ok(())
}
