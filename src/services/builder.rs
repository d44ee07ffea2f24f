//! Notification building: grouping extracted activities into draft records.
//!
//! Activities with the same `(hour, minute, text)` identity collapse into a
//! single draft whose `selected_days` is the union of every day they were
//! seen on. Output ordering is deterministic, so re-running the builder on
//! identical input yields an identical draft set.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveTime;

use crate::extract::Activity;
use crate::models::notification::{DaySource, ALL_DAYS};
use crate::services::fingerprint;

/// A notification record as produced by the builder, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftNotification {
    pub fingerprint: String,
    pub message: String,
    pub fire_time: NaiveTime,
    pub selected_days: BTreeSet<u8>,
    pub day_source: DaySource,
    pub source_line: String,
}

struct Group {
    message: String,
    days: BTreeSet<u8>,
    source_line: String,
}

/// Build deduplicated draft notifications from extracted activities.
///
/// Activities with no day context anywhere in their group become daily
/// records tagged `DaySource::Undetermined` rather than silently defaulting:
/// downstream layers and the UI apply the conservative policy.
pub fn build(activities: &[Activity]) -> Vec<DraftNotification> {
    let mut groups: BTreeMap<(u32, u32, String), Group> = BTreeMap::new();

    for activity in activities {
        let key = (
            activity.hour,
            activity.minute,
            fingerprint::normalize_text(&activity.text),
        );
        let group = groups.entry(key).or_insert_with(|| Group {
            message: activity.text.clone(),
            days: BTreeSet::new(),
            source_line: activity.source_line.clone(),
        });
        if let Some(day) = activity.day_of_week {
            group.days.insert(day);
        }
    }

    groups
        .into_iter()
        .filter_map(|((hour, minute, _normalized), group)| {
            let fire_time = NaiveTime::from_hms_opt(hour, minute, 0)?;
            let (selected_days, day_source) = if group.days.is_empty() {
                tracing::warn!(
                    message = %group.message,
                    "Activity has no day header; treating as daily until clarified"
                );
                (ALL_DAYS.into_iter().collect(), DaySource::Undetermined)
            } else {
                (group.days, DaySource::Explicit)
            };
            Some(DraftNotification {
                fingerprint: fingerprint::compute_notification(hour, minute, &group.message),
                message: group.message,
                fire_time,
                selected_days,
                day_source,
                source_line: group.source_line,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity(day: Option<u8>, hour: u32, minute: u32, text: &str) -> Activity {
        Activity {
            day_of_week: day,
            hour,
            minute,
            text: text.to_string(),
            source_line: format!("{hour}:{minute:02}- {text}"),
        }
    }

    #[test]
    fn explicit_day_yields_exactly_that_day() {
        let drafts = build(&[activity(Some(3), 5, 30, "jeera water")]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].selected_days.iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(drafts[0].day_source, DaySource::Explicit);
    }

    #[test]
    fn repeated_activity_unions_days() {
        let drafts = build(&[
            activity(Some(3), 6, 0, "almonds"),
            activity(Some(4), 6, 0, "almonds"),
        ]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].selected_days.iter().copied().collect::<Vec<_>>(),
            vec![3, 4]
        );
    }

    #[test]
    fn no_day_context_is_tagged_undetermined_not_silent() {
        let drafts = build(&[activity(None, 6, 0, "almonds")]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].day_source, DaySource::Undetermined);
        assert_eq!(drafts[0].selected_days.len(), 7);
    }

    #[test]
    fn dayless_repeat_of_explicit_activity_stays_explicit() {
        let drafts = build(&[
            activity(Some(2), 7, 0, "oats"),
            activity(None, 7, 0, "oats"),
        ]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].day_source, DaySource::Explicit);
        assert_eq!(drafts[0].selected_days.iter().copied().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn casing_and_whitespace_collapse_to_one_record() {
        let drafts = build(&[
            activity(Some(0), 6, 0, "Almonds"),
            activity(Some(1), 6, 0, "  almonds "),
        ]);
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].selected_days.iter().copied().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn distinct_times_stay_distinct() {
        let drafts = build(&[
            activity(Some(0), 6, 0, "water"),
            activity(Some(0), 18, 0, "water"),
        ]);
        assert_eq!(drafts.len(), 2);
    }

    #[test]
    fn output_is_deterministic() {
        let activities = vec![
            activity(Some(4), 6, 0, "almonds"),
            activity(Some(3), 5, 30, "jeera water"),
            activity(Some(3), 6, 0, "almonds"),
        ];
        assert_eq!(build(&activities), build(&activities));
    }

    #[test]
    fn fire_time_has_zero_seconds() {
        let drafts = build(&[activity(Some(3), 5, 30, "jeera water")]);
        assert_eq!(drafts[0].fire_time, NaiveTime::from_hms_opt(5, 30, 0).unwrap());
    }
}
