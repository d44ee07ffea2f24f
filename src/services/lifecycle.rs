//! Extraction lifecycle: extract -> diff -> cancel stale -> install new.
//!
//! Re-extraction is idempotent: unchanged text carries every record forward
//! under a bumped generation without creating duplicates. Writers for one
//! user are serialized by a compare-and-swap on the per-user generation
//! counter; losing the race means retrying against fresh state, never
//! blindly overwriting it. Manual-origin records are invisible to this
//! pipeline.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract;
use crate::models::history::actions;
use crate::models::notification::{
    encode_days, Authority, NotificationRecord, Origin,
};
use crate::services::builder::{self, DraftNotification};
use crate::services::delivery::DeliveryAdapter;
use crate::services::schedule::{self, OccurrenceResult};
use crate::services::history;

/// Bounded retries for the per-user generation compare-and-swap.
const MAX_GENERATION_RETRIES: u32 = 3;

/// What a re-extraction will do to the currently active record set.
#[derive(Debug, Default, PartialEq)]
pub struct LifecyclePlan {
    /// Active extraction records absent from the new set.
    pub deactivate: Vec<Uuid>,
    /// Fingerprint matches: update in place, preserving record identity.
    pub carry: Vec<(Uuid, DraftNotification)>,
    /// Fingerprints never seen before.
    pub install: Vec<DraftNotification>,
}

/// Diff the incoming draft set against the user's extraction records.
///
/// `current` must contain only extraction-origin records (active and
/// inactive); manual records are filtered out before planning and are never
/// touched here. A fingerprint match carries the existing row — reactivating
/// it if a previous generation had retired it — so record identity survives
/// any sequence of re-uploads. Only currently active records can end up
/// deactivated.
pub fn plan_transition(
    current: &[NotificationRecord],
    drafts: Vec<DraftNotification>,
) -> LifecyclePlan {
    let mut best: HashMap<&str, &NotificationRecord> = HashMap::new();
    for record in current {
        // Duplicate fingerprints can only come from legacy data; latest wins.
        best.entry(record.fingerprint.as_str())
            .and_modify(|kept| {
                if record.created_at > kept.created_at {
                    *kept = record;
                }
            })
            .or_insert(record);
    }

    let mut plan = LifecyclePlan::default();
    let mut carried_ids: HashSet<Uuid> = HashSet::new();
    for draft in drafts {
        match best.get(draft.fingerprint.as_str()) {
            Some(existing) => {
                carried_ids.insert(existing.id);
                plan.carry.push((existing.id, draft));
            }
            None => plan.install.push(draft),
        }
    }
    // Everything still active that is not being carried — including any
    // superseded duplicate rows — gets retired.
    plan.deactivate = current
        .iter()
        .filter(|r| r.is_active && !carried_ids.contains(&r.id))
        .map(|r| r.id)
        .collect();
    plan.deactivate.sort();
    plan
}

/// Run the full re-extraction pipeline for one user.
///
/// Safe to call repeatedly with the same text. Returns the user's active
/// records (extraction and manual) after the new generation is installed.
pub async fn re_extract(
    pool: &PgPool,
    delivery: &dyn DeliveryAdapter,
    user_id: Uuid,
    diet_text: &str,
    tz: Tz,
) -> Result<Vec<NotificationRecord>, AppError> {
    let activities = extract::extract(diet_text);
    let drafts = builder::build(&activities);
    tracing::info!(
        user_id = %user_id,
        activities = activities.len(),
        drafts = drafts.len(),
        "Extracted diet text"
    );

    for attempt in 0..MAX_GENERATION_RETRIES {
        let current_generation = fetch_generation(pool, user_id).await?;
        match apply_generation(pool, user_id, current_generation, &drafts, tz).await? {
            ApplyOutcome::Applied {
                deactivated,
                installed,
            } => {
                sync_delivery(delivery, &deactivated, &installed).await;
                return list_active(pool, user_id).await;
            }
            ApplyOutcome::Conflict => {
                tracing::debug!(
                    user_id = %user_id,
                    attempt,
                    "Generation moved during re-extraction; retrying"
                );
            }
        }
    }

    Err(AppError::ConcurrentModification(
        "Re-extraction kept losing to concurrent updates; try again".to_string(),
    ))
}

/// Disarm every active record for a user: delivery triggers are cancelled
/// and the sweep stops considering them. Activation state is untouched;
/// `schedule_all` is the inverse. Idempotent.
pub async fn cancel_all(
    pool: &PgPool,
    delivery: &dyn DeliveryAdapter,
    user_id: Uuid,
) -> Result<usize, AppError> {
    let records = list_active(pool, user_id).await?;

    for record in &records {
        if let Err(e) = delivery.cancel(record.id).await {
            tracing::warn!(record_id = %record.id, error = %e, "Delivery cancel failed");
        }
    }

    sqlx::query(
        "UPDATE diet_notifications SET next_fire_utc = NULL, updated_at = NOW()
         WHERE user_id = $1 AND is_active",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    for record in &records {
        history::record(pool, record.id, user_id, actions::DISARMED, None).await?;
    }

    Ok(records.len())
}

/// Recompute and re-arm the next occurrence for every active server-owned
/// record. Device-owned records belong to the device scheduler. Idempotent.
pub async fn schedule_all(
    pool: &PgPool,
    delivery: &dyn DeliveryAdapter,
    user_id: Uuid,
) -> Result<usize, AppError> {
    let records = list_active(pool, user_id).await?;
    let now = Utc::now();
    let mut scheduled = 0usize;

    for record in records.iter().filter(|r| r.authority == Authority::Server) {
        let tz = schedule::zone_or_utc(&record.timezone);
        let occurrence = match schedule::next_occurrence(record, now, tz) {
            Ok(occ) => occ,
            Err(e) => {
                tracing::warn!(record_id = %record.id, error = %e, "Skipping unschedulable record");
                continue;
            }
        };

        sqlx::query(
            "UPDATE diet_notifications SET next_fire_utc = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(occurrence.utc)
        .bind(record.id)
        .execute(pool)
        .await?;

        if let Err(e) = delivery.cancel(record.id).await {
            tracing::warn!(record_id = %record.id, error = %e, "Delivery cancel failed");
        }
        if let Err(e) = delivery.schedule(record, &occurrence).await {
            tracing::warn!(record_id = %record.id, error = %e, "Delivery schedule failed");
        }

        history::record(
            pool,
            record.id,
            user_id,
            actions::ARMED,
            Some(serde_json::json!({ "next_fire_utc": occurrence.utc })),
        )
        .await?;

        scheduled += 1;
    }

    Ok(scheduled)
}

/// The user's active records, ordered for stable presentation.
pub async fn list_active(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<NotificationRecord>, AppError> {
    let records = sqlx::query_as::<_, NotificationRecord>(
        r#"
        SELECT * FROM diet_notifications
        WHERE user_id = $1 AND is_active
        ORDER BY fire_time ASC, created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

enum ApplyOutcome {
    Applied {
        deactivated: Vec<Uuid>,
        installed: Vec<NotificationRecord>,
    },
    Conflict,
}

/// Ensure the user has a generation row, then read the current counter.
async fn fetch_generation(pool: &PgPool, user_id: Uuid) -> Result<i64, AppError> {
    sqlx::query("INSERT INTO diet_generations (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    let generation =
        sqlx::query_scalar::<_, i64>("SELECT generation FROM diet_generations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(generation)
}

/// Attempt one transactional generation transition.
///
/// The generation bump is a compare-and-swap: if another writer advanced the
/// counter since `expected_generation` was read, nothing is written and the
/// caller retries. Stale records go inactive in the same transaction that
/// installs their replacements, so the delivery layer can never observe an
/// old and a new record active for the same slot.
async fn apply_generation(
    pool: &PgPool,
    user_id: Uuid,
    expected_generation: i64,
    drafts: &[DraftNotification],
    tz: Tz,
) -> Result<ApplyOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let new_generation = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE diet_generations
        SET generation = generation + 1, updated_at = NOW()
        WHERE user_id = $1 AND generation = $2
        RETURNING generation
        "#,
    )
    .bind(user_id)
    .bind(expected_generation)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(new_generation) = new_generation else {
        tx.rollback().await?;
        return Ok(ApplyOutcome::Conflict);
    };

    let current = sqlx::query_as::<_, NotificationRecord>(
        "SELECT * FROM diet_notifications WHERE user_id = $1 AND origin = $2",
    )
    .bind(user_id)
    .bind(Origin::Extraction)
    .fetch_all(&mut *tx)
    .await?;

    let plan = plan_transition(&current, drafts.to_vec());
    let now = Utc::now();

    for id in &plan.deactivate {
        sqlx::query(
            "UPDATE diet_notifications
             SET is_active = FALSE, next_fire_utc = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        history::record(
            &mut *tx,
            *id,
            user_id,
            actions::DEACTIVATED,
            Some(serde_json::json!({ "superseded_by_generation": new_generation })),
        )
        .await?;
    }

    let mut installed = Vec::with_capacity(plan.carry.len() + plan.install.len());

    for (id, draft) in &plan.carry {
        let next_fire = next_fire_or_warn(draft, tz, now);
        let record = sqlx::query_as::<_, NotificationRecord>(
            r#"
            UPDATE diet_notifications
            SET message = $1, selected_days = $2, day_source = $3, generation = $4,
                timezone = $5, source_line = $6, next_fire_utc = $7, is_active = TRUE,
                updated_at = NOW()
            WHERE id = $8
            RETURNING *
            "#,
        )
        .bind(&draft.message)
        .bind(encode_days(&draft.selected_days))
        .bind(draft.day_source)
        .bind(new_generation)
        .bind(tz.name())
        .bind(&draft.source_line)
        .bind(next_fire)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        history::record(
            &mut *tx,
            *id,
            user_id,
            actions::CARRIED,
            Some(serde_json::json!({ "generation": new_generation })),
        )
        .await?;
        installed.push(record);
    }

    for draft in &plan.install {
        let next_fire = next_fire_or_warn(draft, tz, now);
        let record = sqlx::query_as::<_, NotificationRecord>(
            r#"
            INSERT INTO diet_notifications
                (user_id, fingerprint, message, fire_time, selected_days, day_source,
                 origin, authority, is_active, generation, timezone, source_line,
                 next_fire_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&draft.fingerprint)
        .bind(&draft.message)
        .bind(draft.fire_time)
        .bind(encode_days(&draft.selected_days))
        .bind(draft.day_source)
        .bind(Origin::Extraction)
        .bind(Authority::Server)
        .bind(new_generation)
        .bind(tz.name())
        .bind(&draft.source_line)
        .bind(next_fire)
        .fetch_one(&mut *tx)
        .await?;
        history::record(
            &mut *tx,
            record.id,
            user_id,
            actions::INSTALLED,
            Some(serde_json::json!({ "generation": new_generation })),
        )
        .await?;
        installed.push(record);
    }

    tx.commit().await?;

    Ok(ApplyOutcome::Applied {
        deactivated: plan.deactivate,
        installed,
    })
}

fn next_fire_or_warn(
    draft: &DraftNotification,
    tz: Tz,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match schedule::next_occurrence_at(&draft.selected_days, draft.fire_time, now, tz) {
        Ok(occ) => Some(occ.utc),
        Err(e) => {
            tracing::warn!(fingerprint = %draft.fingerprint, error = %e, "No next occurrence");
            None
        }
    }
}

/// Push the committed transition out to the delivery transport, best-effort.
/// Cancels go first, and every arm is preceded by a cancel for the same id,
/// keeping the at-most-once arming contract.
async fn sync_delivery(
    delivery: &dyn DeliveryAdapter,
    deactivated: &[Uuid],
    installed: &[NotificationRecord],
) {
    for id in deactivated {
        if let Err(e) = delivery.cancel(*id).await {
            tracing::warn!(record_id = %id, error = %e, "Delivery cancel failed");
        }
    }

    for record in installed
        .iter()
        .filter(|r| r.authority == Authority::Server)
    {
        if let Err(e) = delivery.cancel(record.id).await {
            tracing::warn!(record_id = %record.id, error = %e, "Delivery cancel failed");
        }
        let Some(next) = record.next_fire_utc else {
            continue;
        };
        let tz = schedule::zone_or_utc(&record.timezone);
        let occurrence = OccurrenceResult {
            local: next.with_timezone(&tz),
            utc: next,
        };
        if let Err(e) = delivery.schedule(record, &occurrence).await {
            tracing::warn!(record_id = %record.id, error = %e, "Delivery schedule failed");
        }
    }
}
