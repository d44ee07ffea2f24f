//! Delivery adapter contract for arming and cancelling reminder triggers.
//!
//! The engine decides *what* fires *when*; how bytes reach a device (local
//! alarm registration, push send) belongs to an external transport behind
//! this trait. Delivery failures are best-effort: they are logged and never
//! roll back lifecycle state.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::notification::NotificationRecord;
use crate::services::schedule::OccurrenceResult;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery transport error: {0}")]
    Transport(String),
}

/// Contract with the delivery transport.
///
/// `schedule` arms exactly one future trigger; duplicate calls with the same
/// `(record.id, occurrence)` must not produce duplicate deliveries, and the
/// engine never issues two `schedule` calls for the same logical slot
/// without an intervening `cancel`. `cancel` on an unknown id is a no-op.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync + std::fmt::Debug {
    async fn schedule(
        &self,
        record: &NotificationRecord,
        occurrence: &OccurrenceResult,
    ) -> Result<(), DeliveryError>;

    async fn cancel(&self, record_id: Uuid) -> Result<(), DeliveryError>;
}

/// Logging adapter wired by default; a deployment substitutes the real
/// transport client here.
#[derive(Debug, Default)]
pub struct LogDelivery;

#[async_trait]
impl DeliveryAdapter for LogDelivery {
    async fn schedule(
        &self,
        record: &NotificationRecord,
        occurrence: &OccurrenceResult,
    ) -> Result<(), DeliveryError> {
        tracing::info!(
            record_id = %record.id,
            fire_utc = %occurrence.utc,
            fire_local = %occurrence.local,
            "Arming delivery trigger"
        );
        Ok(())
    }

    async fn cancel(&self, record_id: Uuid) -> Result<(), DeliveryError> {
        tracing::info!(record_id = %record_id, "Cancelling delivery trigger");
        Ok(())
    }
}
