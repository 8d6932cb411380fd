//! ## meshload-topology::units
//! **Human readable sizes and durations**
//!
//! Sizes: `512`, `1 KB`, `10KiB`, `1.5 MB`. Decimal units are powers of
//! 1000, binary units powers of 1024; units are case-insensitive.
//!
//! Durations: `250us`, `10ms`, `1.5s`, `2m`, `1h`. A string without a unit is
//! read as milliseconds.

use std::time::Duration;

use crate::error::TopologyError;

fn split_number(text: &str) -> (&str, &str) {
    let text = text.trim();
    let end = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    (&text[..end], text[end..].trim())
}

fn parse_number(number: &str) -> Option<f64> {
    if number.is_empty() {
        return None;
    }
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses a byte size.
pub fn parse_size(text: &str) -> Result<u64, TopologyError> {
    let invalid = || TopologyError::InvalidSize(text.to_string());
    let (number, unit) = split_number(text);
    let multiplier: u64 = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1_000,
        "kib" => 1 << 10,
        "m" | "mb" => 1_000_000,
        "mib" => 1 << 20,
        "g" | "gb" => 1_000_000_000,
        "gib" => 1 << 30,
        _ => return Err(invalid()),
    };

    // Integers stay exact; fractions go through f64.
    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(invalid);
    }
    let value = parse_number(number).ok_or_else(invalid)? * multiplier as f64;
    if value > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(value.round() as u64)
}

/// Parses a duration.
pub fn parse_duration(text: &str) -> Result<Duration, TopologyError> {
    let invalid = || TopologyError::InvalidDuration(text.to_string());
    let (number, unit) = split_number(text);
    let nanos_per_unit: f64 = match unit {
        "ns" => 1.0,
        "us" | "µs" => 1e3,
        "" | "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        "h" => 3_600e9,
        _ => return Err(invalid()),
    };
    let nanos = parse_number(number).ok_or_else(invalid)? * nanos_per_unit;
    if nanos > u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Renders a byte size with the largest exact binary or decimal unit.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [(u64, &str); 6] = [
        (1 << 30, "GiB"),
        (1_000_000_000, "GB"),
        (1 << 20, "MiB"),
        (1_000_000, "MB"),
        (1 << 10, "KiB"),
        (1_000, "KB"),
    ];
    for (factor, unit) in UNITS {
        if bytes >= factor && bytes % factor == 0 {
            return format!("{} {}", bytes / factor, unit);
        }
    }
    format!("{bytes} B")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sizes_with_units() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("1 KB").unwrap(), 1_000);
        assert_eq!(parse_size("10KiB").unwrap(), 10_240);
        assert_eq!(parse_size("1.5 mb").unwrap(), 1_500_000);
        assert_eq!(parse_size(" 2 GiB ").unwrap(), 2 << 30);
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        for text in ["", "KB", "-1", "1 XB", "1..2 KB"] {
            assert!(
                matches!(parse_size(text), Err(TopologyError::InvalidSize(_))),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn durations_with_units() {
        assert_eq!(parse_duration("10ms").unwrap(), Duration::from_millis(10));
        assert_eq!(parse_duration("250us").unwrap(), Duration::from_micros(250));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1_500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("40").unwrap(), Duration::from_millis(40));
    }

    #[test]
    fn malformed_durations_are_rejected() {
        for text in ["", "ms", "10 parsecs", "1.2.3s"] {
            assert!(parse_duration(text).is_err(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn sizes_render_with_exact_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1_024), "1 KiB");
        assert_eq!(format_size(10_000), "10 KB");
        assert_eq!(format_size(1_500), "1500 B");
    }

    proptest! {
        #[test]
        fn whole_sizes_parse_exactly(n in 0u64..1_000_000_000) {
            prop_assert_eq!(parse_size(&format!("{n} B")).unwrap(), n);
            prop_assert_eq!(parse_size(&format!("{n}KiB")).unwrap(), n * 1024);
        }

        #[test]
        fn millisecond_durations_parse_exactly(n in 0u64..10_000_000) {
            prop_assert_eq!(parse_duration(&format!("{n}ms")).unwrap(), Duration::from_millis(n));
        }

        #[test]
        fn rendered_sizes_parse_back(n in 0u64..1_000_000_000_000) {
            prop_assert_eq!(parse_size(&format_size(n)).unwrap(), n);
        }
    }
}
