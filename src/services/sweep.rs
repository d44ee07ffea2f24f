//! Periodic dispatch sweep for due server-owned occurrences.
//!
//! A single task ticks at a fixed interval and hands due records to the
//! delivery adapter. The sweep is the only writer of `last_dispatched_utc`;
//! each occurrence is claimed with an atomic check-and-set before dispatch,
//! so overlapping ticks (or a second process) can never double-fire the
//! same slot. Shutdown is graceful: the in-flight tick completes and no new
//! tick starts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::watch;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::history::actions;
use crate::models::notification::{Authority, NotificationRecord};
use crate::services::delivery::DeliveryAdapter;
use crate::services::history;
use crate::services::schedule::{self, OccurrenceResult};

/// Due records examined per tick; the next tick picks up any overflow.
const BATCH_SIZE: i64 = 1000;

/// Counters from one sweep pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub examined: usize,
    pub dispatched: usize,
    /// Claims lost to a concurrent tick; already dispatched elsewhere.
    pub lost_claims: usize,
}

pub struct Sweeper {
    pool: PgPool,
    delivery: Arc<dyn DeliveryAdapter>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(pool: PgPool, delivery: Arc<dyn DeliveryAdapter>, interval: Duration) -> Self {
        Self {
            pool,
            delivery,
            interval,
        }
    }

    /// Tick until the shutdown flag flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_tick().await {
                        Ok(stats) if stats.dispatched > 0 || stats.lost_claims > 0 => {
                            tracing::info!(
                                examined = stats.examined,
                                dispatched = stats.dispatched,
                                lost_claims = stats.lost_claims,
                                "Sweep tick complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Sweep tick failed"),
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender also means the process is going down.
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Sweep shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over due records.
    pub async fn run_tick(&self) -> Result<SweepStats, AppError> {
        let now = Utc::now();
        let due = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT * FROM diet_notifications
            WHERE is_active AND authority = $1
              AND next_fire_utc IS NOT NULL AND next_fire_utc <= $2
            ORDER BY next_fire_utc ASC
            LIMIT $3
            "#,
        )
        .bind(Authority::Server)
        .bind(now)
        .bind(BATCH_SIZE)
        .fetch_all(&self.pool)
        .await?;

        if due.len() as i64 == BATCH_SIZE {
            tracing::warn!(batch = BATCH_SIZE, "Sweep batch full; remainder deferred to next tick");
        }

        let mut stats = SweepStats::default();
        for record in &due {
            stats.examined += 1;
            match self.dispatch_one(record, now).await {
                Ok(true) => stats.dispatched += 1,
                Ok(false) => stats.lost_claims += 1,
                Err(e) => {
                    tracing::warn!(record_id = %record.id, error = %e, "Dispatch failed");
                }
            }
        }

        Ok(stats)
    }

    /// Claim and dispatch one due occurrence. Returns false when another
    /// tick claimed it first.
    async fn dispatch_one(
        &self,
        record: &NotificationRecord,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let Some(due) = record.next_fire_utc else {
            return Ok(false);
        };
        let tz = schedule::zone_or_utc(&record.timezone);

        let next = match schedule::next_occurrence(record, now, tz) {
            Ok(occ) => Some(occ.utc),
            Err(e) => {
                // Disarm rather than retrying a broken record every tick.
                tracing::warn!(record_id = %record.id, error = %e, "No next occurrence; disarming");
                None
            }
        };

        if !self.claim(record.id, due, next).await? {
            return Ok(false);
        }

        let occurrence = OccurrenceResult {
            local: due.with_timezone(&tz),
            utc: due,
        };
        if let Err(e) = self.delivery.schedule(record, &occurrence).await {
            // Best-effort: the occurrence is consumed either way and future
            // occurrences stay armed.
            tracing::warn!(record_id = %record.id, error = %e, "Delivery dispatch failed");
        }

        history::record(
            &self.pool,
            record.id,
            record.user_id,
            actions::DISPATCHED,
            Some(serde_json::json!({ "occurrence_utc": due })),
        )
        .await?;

        Ok(true)
    }

    /// Atomic check-and-set on the dispatch marker.
    async fn claim(
        &self,
        id: Uuid,
        due: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE diet_notifications
            SET last_dispatched_utc = $2, next_fire_utc = $3, updated_at = NOW()
            WHERE id = $1 AND next_fire_utc = $2
              AND (last_dispatched_utc IS NULL OR last_dispatched_utc < $2)
            "#,
        )
        .bind(id)
        .bind(due)
        .bind(next)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
