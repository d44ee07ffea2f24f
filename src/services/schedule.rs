//! Next-occurrence computation for recurring notification records.
//!
//! All arithmetic is calendar-aware: the local candidate is resolved through
//! the zone's rules for the candidate date itself, never by shifting "now"
//! by a fixed minute offset, so occurrences landing on the far side of a
//! DST transition convert correctly.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::models::notification::NotificationRecord;

/// The next concrete instant a record should fire, in both forms.
/// Storage and due-time comparison use `utc`; `local` is for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccurrenceResult {
    pub local: DateTime<Tz>,
    pub utc: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("record has no selected days")]
    NoSelectedDays,
}

/// Parse a stored IANA zone, falling back to UTC with a warning so a bad
/// zone can never leave a record indefinitely pending.
pub fn zone_or_utc(zone: &str) -> Tz {
    zone.parse().unwrap_or_else(|_| {
        tracing::warn!(zone, "Unknown timezone; falling back to UTC");
        Tz::UTC
    })
}

/// Compute the next occurrence for a persisted record.
pub fn next_occurrence(
    record: &NotificationRecord,
    now_utc: DateTime<Utc>,
    tz: Tz,
) -> Result<OccurrenceResult, ScheduleError> {
    next_occurrence_at(&record.days(), record.fire_time, now_utc, tz)
}

/// Compute the earliest next occurrence across a set of weekdays.
///
/// Per target day `d`: `days_ahead = (d - weekday(now)) mod 7`, rolled to a
/// full week when today's slot has already passed. The candidate keeps the
/// target weekday through the local->UTC conversion; tests assert the round
/// trip.
pub fn next_occurrence_at(
    days: &BTreeSet<u8>,
    fire_time: NaiveTime,
    now_utc: DateTime<Utc>,
    tz: Tz,
) -> Result<OccurrenceResult, ScheduleError> {
    // Seconds and sub-seconds are not part of the recurrence grammar.
    let fire_time = fire_time
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(fire_time);

    let now_local = now_utc.with_timezone(&tz);
    let today = now_local.weekday().num_days_from_monday() as i64;

    let mut best: Option<OccurrenceResult> = None;
    for &day in days.iter().filter(|&&d| d <= 6) {
        let mut days_ahead = (day as i64 - today).rem_euclid(7);
        if days_ahead == 0 && now_local.time() >= fire_time {
            // Today's slot already passed; roll to next week.
            days_ahead = 7;
        }
        let candidate_date = now_local.date_naive() + Duration::days(days_ahead);
        let local = resolve_local(tz, candidate_date.and_time(fire_time));
        let utc = local.with_timezone(&Utc);
        if best.as_ref().map_or(true, |b| utc < b.utc) {
            best = Some(OccurrenceResult { local, utc });
        }
    }

    best.ok_or(ScheduleError::NoSelectedDays)
}

/// Resolve a naive local datetime against the zone's calendar rules.
///
/// Ambiguous times (fall-back hour) take the earlier instant; nonexistent
/// times (spring-forward gap) step forward to the nearest valid instant.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => {
            tracing::warn!(%naive, zone = %tz, "Ambiguous local time; using earlier instant");
            earliest
        }
        LocalResult::None => {
            tracing::warn!(%naive, zone = %tz, "Local time in DST gap; using nearest later instant");
            let mut probe = naive;
            for _ in 0..12 {
                probe += Duration::minutes(15);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return dt;
                }
            }
            // Zone data this broken has no meaningful local reading.
            tz.from_utc_datetime(&naive)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(list: &[u8]) -> BTreeSet<u8> {
        list.iter().copied().collect()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn local_now(tz: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    const KOLKATA: Tz = chrono_tz::Asia::Kolkata;
    const NEW_YORK: Tz = chrono_tz::America::New_York;

    #[test]
    fn next_day_target_is_one_day_ahead() {
        // Wednesday 10:00 local, target Thursday 05:30.
        let now = local_now(KOLKATA, 2025, 8, 13, 10, 0);
        let occ = next_occurrence_at(&days(&[3]), time(5, 30), now, KOLKATA).unwrap();
        assert_eq!(occ.local.date_naive().to_string(), "2025-08-14");
        assert_eq!(occ.local.time(), time(5, 30));
    }

    #[test]
    fn same_day_slot_already_passed_rolls_a_full_week() {
        // Thursday 22:30 local, target Thursday 05:30.
        let now = local_now(KOLKATA, 2025, 8, 14, 22, 30);
        let occ = next_occurrence_at(&days(&[3]), time(5, 30), now, KOLKATA).unwrap();
        assert_eq!(occ.local.date_naive().to_string(), "2025-08-21");
    }

    #[test]
    fn slot_later_today_fires_today() {
        // Thursday 05:00 local, target Thursday 05:30.
        let now = local_now(KOLKATA, 2025, 8, 14, 5, 0);
        let occ = next_occurrence_at(&days(&[3]), time(5, 30), now, KOLKATA).unwrap();
        assert_eq!(occ.local.date_naive().to_string(), "2025-08-14");
    }

    #[test]
    fn exact_fire_minute_counts_as_passed() {
        // Thursday 06:00 local, target Thursday 06:00: roll exactly 7 days.
        let now = local_now(KOLKATA, 2025, 8, 14, 6, 0);
        let occ = next_occurrence_at(&days(&[3]), time(6, 0), now, KOLKATA).unwrap();
        assert_eq!(occ.local.date_naive().to_string(), "2025-08-21");
    }

    #[test]
    fn earliest_day_wins_across_set() {
        // Tuesday 12:00 local; Monday and Thursday targets -> Thursday first.
        let now = local_now(KOLKATA, 2025, 8, 12, 12, 0);
        let occ = next_occurrence_at(&days(&[0, 3]), time(9, 0), now, KOLKATA).unwrap();
        assert_eq!(occ.local.weekday().num_days_from_monday(), 3);
        assert_eq!(occ.local.date_naive().to_string(), "2025-08-14");
    }

    #[test]
    fn weekday_survives_utc_round_trip() {
        // Kolkata 05:30 local is the previous day 00:00 UTC: the weekday of
        // the UTC instant differs, but translating back must restore it.
        let now = local_now(KOLKATA, 2025, 8, 12, 12, 0);
        for day in 0u8..7 {
            let occ = next_occurrence_at(&days(&[day]), time(5, 30), now, KOLKATA).unwrap();
            assert_eq!(occ.local.weekday().num_days_from_monday() as u8, day);
            let round_trip = occ.utc.with_timezone(&KOLKATA);
            assert_eq!(round_trip.weekday().num_days_from_monday() as u8, day);
            assert_eq!(round_trip, occ.local);
        }
    }

    #[test]
    fn conversion_uses_offset_of_candidate_date_not_now() {
        // Friday before the US spring-forward (2026-03-08). Monday 09:00
        // lands in EDT (-04); a fixed now-offset (-05) would give 14:00Z.
        let now = local_now(NEW_YORK, 2026, 3, 6, 10, 0);
        let occ = next_occurrence_at(&days(&[0]), time(9, 0), now, NEW_YORK).unwrap();
        assert_eq!(occ.local.date_naive().to_string(), "2026-03-09");
        assert_eq!(occ.utc.to_rfc3339(), "2026-03-09T13:00:00+00:00");
        assert_eq!(occ.local.weekday().num_days_from_monday(), 0);
    }

    #[test]
    fn dst_gap_steps_forward_to_valid_instant() {
        // 02:30 does not exist on 2026-03-08 in New York; expect 03:00 EDT.
        let now = local_now(NEW_YORK, 2026, 3, 7, 12, 0);
        let occ = next_occurrence_at(&days(&[6]), time(2, 30), now, NEW_YORK).unwrap();
        assert_eq!(occ.local.date_naive().to_string(), "2026-03-08");
        assert_eq!(occ.local.time(), time(3, 0));
        assert_eq!(occ.local.weekday().num_days_from_monday(), 6);
    }

    #[test]
    fn ambiguous_fall_back_time_takes_earlier_instant() {
        // 01:30 occurs twice on 2026-11-01 in New York; earlier is EDT (-04).
        let now = local_now(NEW_YORK, 2026, 10, 31, 12, 0);
        let occ = next_occurrence_at(&days(&[6]), time(1, 30), now, NEW_YORK).unwrap();
        assert_eq!(occ.utc.to_rfc3339(), "2026-11-01T05:30:00+00:00");
    }

    #[test]
    fn empty_days_is_an_error() {
        let now = local_now(KOLKATA, 2025, 8, 12, 12, 0);
        let err = next_occurrence_at(&days(&[]), time(9, 0), now, KOLKATA);
        assert!(matches!(err, Err(ScheduleError::NoSelectedDays)));
    }

    #[test]
    fn out_of_range_days_are_ignored() {
        let now = local_now(KOLKATA, 2025, 8, 12, 12, 0);
        let err = next_occurrence_at(&days(&[9]), time(9, 0), now, KOLKATA);
        assert!(matches!(err, Err(ScheduleError::NoSelectedDays)));
    }

    #[test]
    fn zone_or_utc_falls_back() {
        assert_eq!(zone_or_utc("Asia/Kolkata"), KOLKATA);
        assert_eq!(zone_or_utc("Not/AZone"), Tz::UTC);
    }

    #[test]
    fn seconds_are_zeroed() {
        let now = local_now(KOLKATA, 2025, 8, 13, 10, 0);
        let with_secs = NaiveTime::from_hms_opt(5, 30, 45).unwrap();
        let occ = next_occurrence_at(&days(&[3]), with_secs, now, KOLKATA).unwrap();
        assert_eq!(occ.local.time(), time(5, 30));
    }
}
