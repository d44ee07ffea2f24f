//! Diet text extraction: recovering schedulable activities from free text.
//!
//! The text arrives from an external PDF extraction service with no format
//! guarantees beyond loose line-based conventions: optional weekday header
//! lines followed by `time - description` lines. Token recognition lives in
//! a declarative rule table (`rules`), the line scanner in `diet_text`.

pub mod diet_text;
pub mod rules;

pub use diet_text::extract;

/// A single schedulable unit recovered from diet text.
///
/// `day_of_week` is Monday = 0 through Sunday = 6, present only when a day
/// header preceded the line. `hour`/`minute` are 24-hour after AM/PM
/// normalization. `source_line` keeps the original line for traceability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub day_of_week: Option<u8>,
    pub hour: u32,
    pub minute: u32,
    pub text: String,
    pub source_line: String,
}
