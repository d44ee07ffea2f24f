//! Notification record model with enums shared across the scheduling engine.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

// -- Enums matching PostgreSQL --

/// How a record came to exist. Extraction records are swept by the lifecycle
/// pipeline on re-extraction; manual records are never touched by it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_origin")]
pub enum Origin {
    Extraction,
    Manual,
}

/// The single scheduler allowed to arm delivery for a record. The server
/// sweep is a no-op for device-owned records and vice versa.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "delivery_authority")]
pub enum Authority {
    Server,
    Device,
}

/// Whether the selected days came from explicit day headers in the diet text
/// or from the daily-until-clarified fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "day_source")]
pub enum DaySource {
    Explicit,
    Undetermined,
}

// -- Weekday helpers --

/// All seven weekday indices, Monday = 0 through Sunday = 6.
pub const ALL_DAYS: [u8; 7] = [0, 1, 2, 3, 4, 5, 6];

/// Decode a JSONB day array into a sorted set, dropping anything out of range.
pub fn decode_days(value: &serde_json::Value) -> BTreeSet<u8> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_u64())
                .filter(|&d| d <= 6)
                .map(|d| d as u8)
                .collect()
        })
        .unwrap_or_default()
}

/// Encode a day set as a JSONB array (sorted, deduplicated by construction).
pub fn encode_days(days: &BTreeSet<u8>) -> serde_json::Value {
    serde_json::Value::Array(days.iter().map(|&d| serde_json::json!(d)).collect())
}

// -- Wall-clock time serialization --

/// Serde adapter rendering a `NaiveTime` as `"HH:MM"`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

// -- Core record --

/// A persisted diet notification: a recurring reminder on `selected_days`
/// at `fire_time` local wall-clock time in `timezone`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub fingerprint: String,
    pub message: String,
    #[serde(rename = "time", with = "hhmm")]
    pub fire_time: NaiveTime,
    pub selected_days: serde_json::Value,
    pub day_source: DaySource,
    pub origin: Origin,
    pub authority: Authority,
    pub is_active: bool,
    pub generation: i64,
    pub timezone: String,
    pub source_line: Option<String>,
    pub next_fire_utc: Option<DateTime<Utc>>,
    pub last_dispatched_utc: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Selected weekday indices as a sorted set.
    pub fn days(&self) -> BTreeSet<u8> {
        decode_days(&self.selected_days)
    }
}

// -- Request DTOs --

/// Body of the extract endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct ExtractRequest {
    #[validate(length(min = 1, max = 100_000, message = "diet_text must be 1-100000 chars"))]
    pub diet_text: String,
    /// IANA zone name; the configured default applies when absent.
    pub timezone: Option<String>,
}

/// Body of the update endpoint. All fields optional; present fields replace.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateNotificationRequest {
    #[validate(length(min = 1, max = 500, message = "message must be 1-500 chars"))]
    pub message: Option<String>,
    /// Local wall-clock time as "HH:MM".
    pub time: Option<String>,
    pub selected_days: Option<Vec<u8>>,
}

/// Filter query parameters for the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationFilters {
    /// Include soft-cancelled records. Defaults to active-only.
    #[serde(default)]
    pub include_inactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_days_sorted_and_bounded() {
        let value = serde_json::json!([6, 0, 3, 9, 3]);
        let days = decode_days(&value);
        assert_eq!(days.into_iter().collect::<Vec<_>>(), vec![0, 3, 6]);
    }

    #[test]
    fn decode_days_non_array_is_empty() {
        assert!(decode_days(&serde_json::json!(null)).is_empty());
        assert!(decode_days(&serde_json::json!("mon")).is_empty());
    }

    #[test]
    fn encode_days_round_trip() {
        let days: BTreeSet<u8> = [3u8, 4].into_iter().collect();
        let encoded = encode_days(&days);
        assert_eq!(encoded, serde_json::json!([3, 4]));
        assert_eq!(decode_days(&encoded), days);
    }

    #[test]
    fn hhmm_serializes_with_leading_zeros() {
        #[derive(Serialize)]
        struct Wrapper {
            #[serde(with = "hhmm")]
            t: NaiveTime,
        }
        let w = Wrapper {
            t: NaiveTime::from_hms_opt(5, 30, 0).unwrap(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["t"], "05:30");
    }

    #[test]
    fn hhmm_rejects_garbage() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(with = "hhmm")]
            #[allow(dead_code)]
            t: NaiveTime,
        }
        assert!(serde_json::from_value::<Wrapper>(serde_json::json!({"t": "25:99"})).is_err());
        assert!(serde_json::from_value::<Wrapper>(serde_json::json!({"t": "morning"})).is_err());
    }

    #[test]
    fn extract_request_validates_length() {
        let req = ExtractRequest {
            diet_text: String::new(),
            timezone: None,
        };
        assert!(req.validate().is_err());

        let req = ExtractRequest {
            diet_text: "6 AM- almonds".to_string(),
            timezone: Some("Asia/Kolkata".to_string()),
        };
        assert!(req.validate().is_ok());
    }
}
