//! Lifecycle audit trail models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single lifecycle event recorded against a notification.
///
/// No foreign key backs `notification_id`: history must outlive deletes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationHistory {
    pub id: Uuid,
    pub notification_id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle actions written to the history trail.
pub mod actions {
    pub const INSTALLED: &str = "installed";
    pub const CARRIED: &str = "carried";
    pub const DEACTIVATED: &str = "deactivated";
    pub const UPDATED: &str = "updated";
    pub const DELETED: &str = "deleted";
    pub const ARMED: &str = "armed";
    pub const DISARMED: &str = "disarmed";
    pub const DISPATCHED: &str = "dispatched";
}
