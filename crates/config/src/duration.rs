//! Human-friendly durations: `"90s"`, `"15m"`, `"1h30m"`, `"30d"`.
//!
//! A bare integer is read as seconds.

use crate::error::{ErrorKind, Result};
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use std::time::Duration;

const UNITS: [(&str, u64); 6] = [
    ("ms", 1),
    ("s", 1_000),
    ("m", 60 * 1_000),
    ("h", 60 * 60 * 1_000),
    ("d", 24 * 60 * 60 * 1_000),
    ("w", 7 * 24 * 60 * 60 * 1_000),
];

/// Parse a sequence of `<number><unit>` pairs.
pub fn parse(input: &str) -> Result<Duration> {
    let invalid = || exn::Exn::from(ErrorKind::InvalidDuration(input.to_string()));
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(seconds));
    }

    let mut total_ms: u64 = 0;
    let mut rest = trimmed;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];
        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = rest[..unit_len].trim();
        rest = &rest[unit_len..];
        let (_, factor) = UNITS.iter().find(|(name, _)| *name == unit).ok_or_else(invalid)?;
        total_ms = amount
            .checked_mul(*factor)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(invalid)?;
    }
    Ok(Duration::from_millis(total_ms))
}

/// The shortest exact rendering in the largest whole unit.
pub fn format(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms == 0 {
        return "0s".to_string();
    }
    UNITS
        .iter()
        .rev()
        .find(|(_, factor)| ms % u128::from(*factor) == 0)
        .map(|(name, factor)| format!("{}{name}", ms / u128::from(*factor)))
        .unwrap_or_else(|| format!("{ms}ms"))
}

/// `#[serde(with = "crate::duration")]` support.
pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(*duration))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Duration, D::Error> {
    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a duration such as \"15m\" or a number of seconds")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> std::result::Result<Duration, E> {
            parse(value).map_err(|e| E::custom(&*e))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> std::result::Result<Duration, E> {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> std::result::Result<Duration, E> {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration cannot be negative"))
        }
    }

    deserializer.deserialize_any(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("15m", Duration::from_secs(15 * 60))]
    #[case("2m", Duration::from_secs(120))]
    #[case("24h", Duration::from_secs(24 * 60 * 60))]
    #[case("30d", Duration::from_secs(30 * 24 * 60 * 60))]
    #[case("1h30m", Duration::from_secs(90 * 60))]
    #[case("1h 30m", Duration::from_secs(90 * 60))]
    #[case("250ms", Duration::from_millis(250))]
    #[case("2w", Duration::from_secs(14 * 24 * 60 * 60))]
    #[case("45", Duration::from_secs(45))]
    fn test_parse(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("m")]
    #[case("15x")]
    #[case("-5m")]
    #[case("99999999999999999999d")]
    fn test_parse_invalid(#[case] input: &str) {
        assert!(matches!(&*parse(input).unwrap_err(), ErrorKind::InvalidDuration(_)));
    }

    #[rstest]
    #[case(Duration::from_secs(15 * 60), "15m")]
    #[case(Duration::from_secs(24 * 60 * 60), "1d")]
    #[case(Duration::from_secs(90 * 60), "90m")]
    #[case(Duration::from_millis(1500), "1500ms")]
    #[case(Duration::ZERO, "0s")]
    fn test_format(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format(duration), expected);
        assert_eq!(parse(expected).unwrap(), duration);
    }
}
