//! Fingerprint computation for notification identity across re-extractions.
//!
//! A record's identity is a deterministic hash of `(hour, minute, text)`,
//! with the text normalized so whitespace and casing drift between uploads
//! does not change identity. Selected days are excluded: the same reminder
//! seen on more days is the same reminder with a wider recurrence.

use sha2::{Digest, Sha256};

/// Compute a notification fingerprint from its 24-hour time and text.
pub fn compute_notification(hour: u32, minute: u32, text: &str) -> String {
    hash(&format!("DIET:{hour:02}:{minute:02}:{}", normalize_text(text)))
}

/// Collapse whitespace and lowercase for identity comparison.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// SHA-256 hash a string and return hex-encoded digest.
fn hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_same_fingerprint() {
        let fp1 = compute_notification(5, 30, "1 glass jeera water");
        let fp2 = compute_notification(5, 30, "1 glass jeera water");
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn whitespace_and_case_do_not_change_identity() {
        let fp1 = compute_notification(6, 0, "Almonds");
        let fp2 = compute_notification(6, 0, "  almonds  ");
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn different_time_different_fingerprint() {
        let fp1 = compute_notification(5, 30, "jeera water");
        let fp2 = compute_notification(5, 45, "jeera water");
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn different_text_different_fingerprint() {
        let fp1 = compute_notification(6, 0, "almonds");
        let fp2 = compute_notification(6, 0, "walnuts");
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn hour_minute_zero_padded() {
        // 1:23 must not collide with 12:3 under naive concatenation.
        let fp1 = compute_notification(1, 23, "snack");
        let fp2 = compute_notification(12, 3, "snack");
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = compute_notification(7, 0, "oats");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
