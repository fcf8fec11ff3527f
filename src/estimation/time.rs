//! Clock-like duration text to decimal hours, and back.
//!
//! Estimates are entered as `H`, `HH` or `H:MM` and computed on as decimal
//! hours. Round trips are exact on the decimal value only: `"2"` decodes to
//! `2` and encodes back as `"02:00"`.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{EstimationError, Result};

const MINUTES_PER_HOUR: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Accepted entry format: up to three hour digits, optional two-digit minutes.
static TIME_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(:[0-5]\d)?$").expect("Invalid time entry regex"));

/// Decode duration text into decimal hours.
///
/// Absent or blank text is zero. The first `:`-separated segment is hours,
/// the optional second is minutes; an empty segment counts as zero.
pub fn decode_time(text: Option<&str>) -> Result<Decimal> {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(Decimal::ZERO);
    };

    let mut segments = text.split(':');
    let hours = parse_segment(text, segments.next())?;
    let minutes = parse_segment(text, segments.next())?;
    if segments.next().is_some() {
        return Err(malformed(text));
    }

    hours
        .checked_add(minutes / MINUTES_PER_HOUR)
        .ok_or_else(|| malformed(text))
}

fn parse_segment(text: &str, segment: Option<&str>) -> Result<Decimal> {
    match segment.map(str::trim) {
        None | Some("") => Ok(Decimal::ZERO),
        Some(s) => s.parse::<Decimal>().map_err(|_| malformed(text)),
    }
}

fn malformed(text: &str) -> EstimationError {
    EstimationError::MalformedDuration {
        value: text.to_string(),
    }
}

/// Encode decimal hours as zero-padded `HH:MM`.
///
/// Minutes are rounded half away from zero and carry into the hour when
/// they reach 60. Negative input encodes as `00:00`.
pub fn encode_time(hours: Decimal) -> String {
    let (h, m) = split_hours(hours);
    format!("{:02}:{:02}", h, m)
}

/// Compact display form: `0h`, `3h`, `2h30m`.
pub fn format_hours(hours: Decimal) -> String {
    match split_hours(hours) {
        (0, 0) => "0h".to_string(),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}m", h, m),
    }
}

fn split_hours(hours: Decimal) -> (u64, u64) {
    if hours.is_sign_negative() {
        return (0, 0);
    }

    let whole = hours.floor();
    let minutes = ((hours - whole) * MINUTES_PER_HOUR)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let mut h = whole.to_u64().unwrap_or(u64::MAX);
    let mut m = minutes.to_u64().unwrap_or_default();
    if m >= 60 {
        h = h.saturating_add(1);
        m -= 60;
    }
    (h, m)
}

/// Whether text is acceptable in an estimate field. Blank is acceptable.
pub fn is_valid_time(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || TIME_ENTRY.is_match(text)
}

/// Clean up raw keyboard entry for an estimate field.
///
/// Keeps only digits and `:`. Digits typed without a separator get one
/// after the second digit, keeping at most two minute digits.
pub fn normalize_time_input(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect();

    if cleaned.contains(':') || cleaned.len() <= 2 {
        return cleaned;
    }

    let minutes: String = cleaned[2..].chars().take(2).collect();
    format!("{}:{}", &cleaned[..2], minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decode_reference_values() {
        assert_eq!(decode_time(Some("")), Ok(dec!(0)));
        assert_eq!(decode_time(None), Ok(dec!(0)));
        assert_eq!(decode_time(Some("8")), Ok(dec!(8.0)));
        assert_eq!(decode_time(Some("2:30")), Ok(dec!(2.5)));
        assert_eq!(decode_time(Some("0:45")), Ok(dec!(0.75)));
        assert_eq!(decode_time(Some("12:15")), Ok(dec!(12.25)));
    }

    #[test]
    fn test_decode_empty_minutes() {
        assert_eq!(decode_time(Some("3:")), Ok(dec!(3)));
    }

    #[test]
    fn test_decode_malformed() {
        for text in ["abc", "1:xx", "1:2:3", "h:30"] {
            assert!(
                matches!(
                    decode_time(Some(text)),
                    Err(EstimationError::MalformedDuration { .. })
                ),
                "expected {text} to be rejected"
            );
        }
    }

    #[test]
    fn test_encode_reference_values() {
        assert_eq!(encode_time(dec!(2.5)), "02:30");
        assert_eq!(encode_time(dec!(8)), "08:00");
        assert_eq!(encode_time(dec!(0)), "00:00");
        assert_eq!(encode_time(dec!(125.75)), "125:45");
    }

    #[test]
    fn test_encode_carries_rounded_minutes() {
        assert_eq!(encode_time(dec!(1.9999)), "02:00");
        assert_eq!(encode_time(dec!(-3)), "00:00");
    }

    #[test]
    fn test_round_trip_is_on_value_not_text() {
        let hours = decode_time(Some("2")).unwrap();
        assert_eq!(encode_time(hours), "02:00");
        assert_eq!(decode_time(Some(&encode_time(hours))), Ok(hours));

        let third = decode_time(Some("1:20")).unwrap();
        assert_eq!(encode_time(third), "01:20");
    }

    #[test]
    fn test_decode_overflow_is_malformed() {
        let max = "79228162514264337593543950335";
        assert_eq!(decode_time(Some(max)), Ok(Decimal::MAX));
        assert_eq!(
            decode_time(Some("79228162514264337593543950335:59")),
            Err(EstimationError::MalformedDuration {
                value: "79228162514264337593543950335:59".to_string()
            })
        );
        assert_eq!(encode_time(Decimal::MAX), format!("{}:00", u64::MAX));
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(dec!(0)), "0h");
        assert_eq!(format_hours(dec!(3)), "3h");
        assert_eq!(format_hours(dec!(2.5)), "2h30m");
    }

    #[test]
    fn test_is_valid_time() {
        assert!(is_valid_time(""));
        assert!(is_valid_time("8"));
        assert!(is_valid_time("120:05"));
        assert!(!is_valid_time("1:60"));
        assert!(!is_valid_time("1234"));
        assert!(!is_valid_time("2:3"));
    }

    #[test]
    fn test_normalize_time_input() {
        assert_eq!(normalize_time_input("0230"), "02:30");
        assert_eq!(normalize_time_input("12345"), "12:34");
        assert_eq!(normalize_time_input("4h"), "4");
        assert_eq!(normalize_time_input("1:5a"), "1:5");
    }
}
