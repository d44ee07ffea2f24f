//! Line scanner turning raw diet text into activities.
//!
//! A day-header line sets the current-day context until the next header or
//! end of text. Time-token lines become activities; everything else is prose
//! and is skipped. Pure function: same input, same output, no carried state.

use super::rules::{self, TimeToken};
use super::Activity;

/// Minimum activity text length after trimming; shorter remnants are noise.
const MIN_ACTIVITY_LEN: usize = 3;

/// Scan diet text and return every recognizable activity in order.
pub fn extract(text: &str) -> Vec<Activity> {
    let mut current_day: Option<u8> = None;
    let mut activities = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = rules::match_day_header(line) {
            current_day = Some(header.day);
            // Headers occasionally carry the first activity on the same line.
            if !header.remainder.is_empty() {
                if let Some(token) = rules::match_time_token(&header.remainder) {
                    push_activity(&mut activities, current_day, token, raw_line);
                }
            }
            continue;
        }

        if let Some(token) = rules::match_time_token(line) {
            push_activity(&mut activities, current_day, token, raw_line);
        }
    }

    activities
}

fn push_activity(
    activities: &mut Vec<Activity>,
    day_of_week: Option<u8>,
    token: TimeToken,
    raw_line: &str,
) {
    let text = token
        .rest
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | '–' | '—' | ':' | ',' | '.'))
        .to_string();

    if text.chars().count() < MIN_ACTIVITY_LEN {
        tracing::debug!(line = raw_line, "Skipping near-empty activity");
        return;
    }

    activities.push(Activity {
        day_of_week,
        hour: token.hour,
        minute: token.minute,
        text,
        source_line: raw_line.trim().to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_DAY_PLAN: &str = "THURSDAY- 14 AUG\n5:30 AM- 1 glass jeera water\nFRIDAY- 15 AUG\n6 AM- almonds";

    #[test]
    fn header_sets_day_for_following_lines() {
        let activities = extract(TWO_DAY_PLAN);
        assert_eq!(activities.len(), 2);

        assert_eq!(activities[0].day_of_week, Some(3));
        assert_eq!((activities[0].hour, activities[0].minute), (5, 30));
        assert_eq!(activities[0].text, "1 glass jeera water");

        assert_eq!(activities[1].day_of_week, Some(4));
        assert_eq!((activities[1].hour, activities[1].minute), (6, 0));
        assert_eq!(activities[1].text, "almonds");
    }

    #[test]
    fn day_context_persists_until_next_header() {
        let text = "MONDAY\n7 AM- oats\n9 AM- fruit\nTUESDAY\n7 AM- poha";
        let activities = extract(text);
        assert_eq!(activities.len(), 3);
        assert_eq!(activities[0].day_of_week, Some(0));
        assert_eq!(activities[1].day_of_week, Some(0));
        assert_eq!(activities[2].day_of_week, Some(1));
    }

    #[test]
    fn no_header_means_no_day() {
        let activities = extract("6 AM- almonds\n8 AM- breakfast");
        assert_eq!(activities.len(), 2);
        assert!(activities.iter().all(|a| a.day_of_week.is_none()));
    }

    #[test]
    fn prose_lines_are_skipped() {
        let text = "MONDAY\nDrink plenty of water.\n7 AM- oats\nAvoid fried food";
        let activities = extract(text);
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].text, "oats");
    }

    #[test]
    fn near_empty_activities_are_dropped() {
        let activities = extract("MONDAY\n7 AM- a\n8 AM- oats");
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].text, "oats");
    }

    #[test]
    fn header_line_with_inline_activity() {
        let activities = extract("MONDAY 7 AM- morning walk");
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].day_of_week, Some(0));
        assert_eq!((activities[0].hour, activities[0].minute), (7, 0));
        assert_eq!(activities[0].text, "morning walk");
    }

    #[test]
    fn source_line_is_retained() {
        let activities = extract("  5:30 AM- 1 glass jeera water  ");
        assert_eq!(activities[0].source_line, "5:30 AM- 1 glass jeera water");
    }

    #[test]
    fn empty_text_yields_no_activities() {
        assert!(extract("").is_empty());
        assert!(extract("\n\n   \n").is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        assert_eq!(extract(TWO_DAY_PLAN), extract(TWO_DAY_PLAN));
    }

    #[test]
    fn crlf_input_handled() {
        let activities = extract("THURSDAY- 14 AUG\r\n5:30 AM- 1 glass jeera water\r\n");
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].day_of_week, Some(3));
    }
}
