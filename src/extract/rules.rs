//! Declarative token rules for day headers and time tokens.
//!
//! Each rule pairs a pattern with the extraction it applies, so new diet
//! formats are added as table entries rather than new branching logic, and
//! each rule is independently testable.

use std::sync::OnceLock;

use regex::{Captures, Regex};

/// A matched time token: normalized 24-hour time plus the rest of the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeToken {
    pub hour: u32,
    pub minute: u32,
    /// Line content after the token and separators.
    pub rest: String,
    /// Name of the rule that matched.
    pub rule: &'static str,
}

/// A matched day header: weekday index plus any trailing fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayHeader {
    /// Monday = 0 through Sunday = 6.
    pub day: u8,
    /// Trailing content after the day name, typically a date fragment.
    pub remainder: String,
}

/// A single time-token rule: pattern plus extraction function.
struct TimeTokenRule {
    name: &'static str,
    pattern: &'static str,
    convert: fn(&Captures) -> Option<(u32, u32)>,
}

/// Time-token rules, tried in order; earlier rules are more specific.
const TIME_TOKEN_RULES: &[TimeTokenRule] = &[
    TimeTokenRule {
        name: "clock_meridiem",
        pattern: r"(?i)^\s*(?P<hour>\d{1,2})[:.](?P<minute>\d{2})\s*(?P<meridiem>[ap]\.?m\.?)(?:[\s\-–—:,.]+|$)(?P<rest>.*)$",
        convert: convert_meridiem,
    },
    TimeTokenRule {
        name: "bare_meridiem",
        pattern: r"(?i)^\s*(?P<hour>\d{1,2})\s*(?P<meridiem>[ap]\.?m\.?)(?:[\s\-–—:,.]+|$)(?P<rest>.*)$",
        convert: convert_meridiem,
    },
    TimeTokenRule {
        name: "clock_24h",
        pattern: r"^\s*(?P<hour>\d{1,2})[:.](?P<minute>\d{2})(?:[\s\-–—:,.]+|$)(?P<rest>.*)$",
        convert: convert_24h,
    },
];

/// A single day-header rule: pattern plus the weekday it names.
struct DayHeaderRule {
    pattern: &'static str,
    day: u8,
}

/// Day-header rules. Full names and common abbreviations, anchored at line
/// start with a word boundary so "sunflower" never reads as Sunday.
const DAY_HEADER_RULES: &[DayHeaderRule] = &[
    DayHeaderRule {
        pattern: r"(?i)^\s*mon(?:day)?\b[\s\-–—:,.]*(?P<remainder>.*)$",
        day: 0,
    },
    DayHeaderRule {
        pattern: r"(?i)^\s*tue(?:sday|s)?\b[\s\-–—:,.]*(?P<remainder>.*)$",
        day: 1,
    },
    DayHeaderRule {
        pattern: r"(?i)^\s*wed(?:nesday)?\b[\s\-–—:,.]*(?P<remainder>.*)$",
        day: 2,
    },
    DayHeaderRule {
        pattern: r"(?i)^\s*thu(?:rsday|rs|r)?\b[\s\-–—:,.]*(?P<remainder>.*)$",
        day: 3,
    },
    DayHeaderRule {
        pattern: r"(?i)^\s*fri(?:day)?\b[\s\-–—:,.]*(?P<remainder>.*)$",
        day: 4,
    },
    DayHeaderRule {
        pattern: r"(?i)^\s*sat(?:urday)?\b[\s\-–—:,.]*(?P<remainder>.*)$",
        day: 5,
    },
    DayHeaderRule {
        pattern: r"(?i)^\s*sun(?:day)?\b[\s\-–—:,.]*(?P<remainder>.*)$",
        day: 6,
    },
];

/// Convert a meridiem match to 24-hour form: 12 AM -> 00, 12 PM -> 12.
fn convert_meridiem(caps: &Captures) -> Option<(u32, u32)> {
    let hour: u32 = caps.name("hour")?.as_str().parse().ok()?;
    let minute: u32 = match caps.name("minute") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour) || minute > 59 {
        return None;
    }
    let pm = caps
        .name("meridiem")?
        .as_str()
        .to_ascii_lowercase()
        .starts_with('p');
    let hour24 = if pm { hour % 12 + 12 } else { hour % 12 };
    Some((hour24, minute))
}

/// Validate a bare 24-hour match.
fn convert_24h(caps: &Captures) -> Option<(u32, u32)> {
    let hour: u32 = caps.name("hour")?.as_str().parse().ok()?;
    let minute: u32 = caps.name("minute")?.as_str().parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

fn compiled_time_rules() -> &'static [(usize, Regex)] {
    static COMPILED: OnceLock<Vec<(usize, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        TIME_TOKEN_RULES
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| Regex::new(rule.pattern).ok().map(|re| (i, re)))
            .collect()
    })
}

fn compiled_day_rules() -> &'static [(usize, Regex)] {
    static COMPILED: OnceLock<Vec<(usize, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        DAY_HEADER_RULES
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| Regex::new(rule.pattern).ok().map(|re| (i, re)))
            .collect()
    })
}

/// Match a line against the time-token rule table.
pub fn match_time_token(line: &str) -> Option<TimeToken> {
    for (i, re) in compiled_time_rules() {
        let rule = &TIME_TOKEN_RULES[*i];
        if let Some(caps) = re.captures(line) {
            if let Some((hour, minute)) = (rule.convert)(&caps) {
                let rest = caps.name("rest").map_or("", |m| m.as_str());
                return Some(TimeToken {
                    hour,
                    minute,
                    rest: rest.trim().to_string(),
                    rule: rule.name,
                });
            }
        }
    }
    None
}

/// Match a line against the day-header rule table.
pub fn match_day_header(line: &str) -> Option<DayHeader> {
    for (i, re) in compiled_day_rules() {
        let rule = &DAY_HEADER_RULES[*i];
        if let Some(caps) = re.captures(line) {
            let remainder = caps.name("remainder").map_or("", |m| m.as_str());
            return Some(DayHeader {
                day: rule.day,
                remainder: remainder.trim().to_string(),
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- Time tokens --

    #[test]
    fn clock_meridiem_am() {
        let tok = match_time_token("5:30 AM- 1 glass jeera water").unwrap();
        assert_eq!((tok.hour, tok.minute), (5, 30));
        assert_eq!(tok.rest, "1 glass jeera water");
        assert_eq!(tok.rule, "clock_meridiem");
    }

    #[test]
    fn clock_meridiem_pm_adds_twelve() {
        let tok = match_time_token("7:15 PM: dinner").unwrap();
        assert_eq!((tok.hour, tok.minute), (19, 15));
        assert_eq!(tok.rest, "dinner");
    }

    #[test]
    fn clock_meridiem_dotted_and_lowercase() {
        let tok = match_time_token("8.45 p.m. - warm milk").unwrap();
        assert_eq!((tok.hour, tok.minute), (20, 45));
        assert_eq!(tok.rest, "warm milk");
    }

    #[test]
    fn bare_meridiem() {
        let tok = match_time_token("6 AM- almonds").unwrap();
        assert_eq!((tok.hour, tok.minute), (6, 0));
        assert_eq!(tok.rest, "almonds");
        assert_eq!(tok.rule, "bare_meridiem");
    }

    #[test]
    fn twelve_am_is_midnight_twelve_pm_is_noon() {
        let am = match_time_token("12 AM- water").unwrap();
        assert_eq!(am.hour, 0);
        let pm = match_time_token("12:30 PM- lunch").unwrap();
        assert_eq!((pm.hour, pm.minute), (12, 30));
    }

    #[test]
    fn clock_24h() {
        let tok = match_time_token("17:45 - evening snack").unwrap();
        assert_eq!((tok.hour, tok.minute), (17, 45));
        assert_eq!(tok.rest, "evening snack");
        assert_eq!(tok.rule, "clock_24h");
    }

    #[test]
    fn word_starting_with_am_is_not_a_meridiem() {
        // "6 amazing stretches" must not read as 6 AM.
        assert!(match_time_token("6 amazing stretches").is_none());
    }

    #[test]
    fn out_of_range_times_rejected() {
        assert!(match_time_token("25:00 - snack").is_none());
        assert!(match_time_token("5:75 AM- snack").is_none());
        assert!(match_time_token("13 PM- snack").is_none());
    }

    #[test]
    fn prose_line_is_not_a_time_token() {
        assert!(match_time_token("Drink plenty of water during the day").is_none());
    }

    #[test]
    fn token_without_text_yields_empty_rest() {
        let tok = match_time_token("6 AM").unwrap();
        assert_eq!(tok.rest, "");
    }

    // -- Day headers --

    #[test]
    fn full_day_name_with_date_fragment() {
        let header = match_day_header("THURSDAY- 14 AUG").unwrap();
        assert_eq!(header.day, 3);
        assert_eq!(header.remainder, "14 AUG");
    }

    #[test]
    fn all_seven_full_names() {
        let names = [
            ("Monday", 0u8),
            ("Tuesday", 1),
            ("Wednesday", 2),
            ("Thursday", 3),
            ("Friday", 4),
            ("Saturday", 5),
            ("Sunday", 6),
        ];
        for (name, day) in names {
            let header = match_day_header(name).unwrap();
            assert_eq!(header.day, day, "wrong index for {name}");
            assert_eq!(header.remainder, "");
        }
    }

    #[test]
    fn abbreviations() {
        assert_eq!(match_day_header("Mon").unwrap().day, 0);
        assert_eq!(match_day_header("Tues - 12 Aug").unwrap().day, 1);
        assert_eq!(match_day_header("WED:").unwrap().day, 2);
        assert_eq!(match_day_header("Thurs").unwrap().day, 3);
        assert_eq!(match_day_header("FRI- 15 AUG").unwrap().day, 4);
    }

    #[test]
    fn sunflower_is_not_sunday() {
        assert!(match_day_header("sunflower seeds with breakfast").is_none());
    }

    #[test]
    fn monitor_is_not_monday() {
        assert!(match_day_header("monitor your weight weekly").is_none());
    }

    #[test]
    fn day_name_mid_line_is_not_a_header() {
        assert!(match_day_header("repeat on every friday").is_none());
    }
}
