//! Helper functions and utilities
//!
//! This module contains common helper functions used throughout the application.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use rand::Rng;
use regex::Regex;

/// Alphabet used for check-in codes. Ambiguous glyphs (0/O, 1/I) are left out
/// so codes can be read aloud at the door.
pub const CHECKIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a check-in code
pub const CHECKIN_CODE_LENGTH: usize = 8;

/// Generate a random check-in code
pub fn generate_checkin_code() -> String {
    let mut rng = rand::thread_rng();

    (0..CHECKIN_CODE_LENGTH)
        .map(|_| {
            let idx = rng.gen_range(0..CHECKIN_CODE_ALPHABET.len());
            CHECKIN_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Check whether the (already uppercased) text looks like a check-in code
pub fn is_checkin_code(text: &str) -> bool {
    text.len() == CHECKIN_CODE_LENGTH && text.bytes().all(|b| CHECKIN_CODE_ALPHABET.contains(&b))
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
            .expect("email pattern compiles")
    })
}

/// Validate email format
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && email_regex().is_match(email)
}

/// Trim and lowercase an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Keep only the digits of a phone number
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate phone number format (basic validation)
pub fn is_valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    let digits = normalize_phone(phone).len();
    allowed && (7..=15).contains(&digits)
}

/// Parse an `HH:MM` time of day
pub fn parse_hhmm(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M").ok()
}

/// Format a time of day as `HH:MM`
pub fn format_hhmm(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Absolute distance between two times of day, in minutes
pub fn minutes_apart(a: NaiveTime, b: NaiveTime) -> i64 {
    (a.signed_duration_since(b)).num_minutes().abs()
}

/// Percentage of `part` over `whole`, rounded to one decimal; 0 when `whole` is 0
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round1(part as f64 / whole as f64 * 100.0)
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to two decimal places (currency)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bucket an age into the reporting groups
pub fn age_group(age: Option<i32>) -> &'static str {
    match age {
        None => "unknown",
        Some(a) if a < 18 => "<18",
        Some(a) if a <= 25 => "18-25",
        Some(a) if a <= 35 => "26-35",
        Some(a) if a <= 45 => "36-45",
        Some(a) if a <= 60 => "46-60",
        Some(_) => "60+",
    }
}

/// Number of pages needed for `total` items
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if page_size <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}

/// 1-based page number for a skip/limit window
pub fn page_number(skip: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 1;
    }
    skip / limit + 1
}

/// Whether the timestamp falls on the given UTC calendar day
pub fn is_same_day(timestamp: DateTime<Utc>, day: chrono::NaiveDate) -> bool {
    timestamp.date_naive() == day
}

/// Sanitize filename for a Content-Disposition header
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ana@ccb.do"));
        assert!(is_valid_email("first.last+tag@mail.example.com"));
        assert!(!is_valid_email("invalid-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@nouser.com"));
    }

    #[test]
    fn test_phone_helpers() {
        assert_eq!(normalize_phone("+1 (809) 555-0101"), "18095550101");
        assert!(is_valid_phone("809-555-0101"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("809-CALL-NOW"));
    }

    #[test]
    fn test_time_helpers() {
        let a = parse_hhmm("19:30").unwrap();
        let b = parse_hhmm("21:00").unwrap();
        assert_eq!(minutes_apart(a, b), 90);
        assert_eq!(format_hhmm(a), "19:30");
        assert!(parse_hhmm("7pm").is_none());
    }

    #[test]
    fn test_percentage_and_pages() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(total_pages(41, 20), 3);
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(page_number(40, 20), 3);
    }

    #[test]
    fn test_age_groups() {
        assert_eq!(age_group(Some(17)), "<18");
        assert_eq!(age_group(Some(25)), "18-25");
        assert_eq!(age_group(Some(61)), "60+");
        assert_eq!(age_group(None), "unknown");
    }

    proptest! {
        #[test]
        fn generated_codes_are_recognized(_seed in 0u8..50) {
            let code = generate_checkin_code();
            prop_assert_eq!(code.len(), CHECKIN_CODE_LENGTH);
            prop_assert!(is_checkin_code(&code));
        }

        #[test]
        fn percentage_stays_in_range(part in 0i64..10_000, extra in 0i64..10_000) {
            let whole = part + extra;
            let value = percentage(part, whole);
            prop_assert!((0.0..=100.0).contains(&value));
        }
    }
}
