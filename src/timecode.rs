//! Conversion between fractional seconds and SRT timestamps (`HH:MM:SS,mmm`).

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SubweaveError};

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2,}):([0-5]\d):([0-5]\d),(\d{3})$").expect("timestamp pattern is valid")
});

/// Format seconds as an SRT timestamp.
///
/// The value is decomposed with floor division into hours, minutes and whole
/// seconds; the fractional remainder is rounded to milliseconds. A rounded
/// value of 1000 ms carries into the seconds field and cascades upwards, so
/// `59.9996` formats as `00:01:00,000`.
pub fn seconds_to_timestamp(seconds: f64) -> Result<String> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(SubweaveError::InvalidTimecode(format!(
            "{} is not a finite, non-negative number of seconds",
            seconds
        )));
    }

    let mut hours = (seconds / 3600.0).floor() as u64;
    let remainder = seconds % 3600.0;
    let mut minutes = (remainder / 60.0).floor() as u64;
    let remainder = remainder % 60.0;
    let mut secs = remainder.floor() as u64;
    let mut millis = ((remainder - remainder.floor()) * 1000.0).round() as u64;

    if millis >= 1000 {
        millis -= 1000;
        secs += 1;
    }
    if secs >= 60 {
        secs -= 60;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        hours += 1;
    }

    Ok(format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis))
}

/// Parse an SRT timestamp back into seconds. Inverse of [`seconds_to_timestamp`].
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let caps = TIMESTAMP
        .captures(timestamp.trim())
        .ok_or_else(|| SubweaveError::InvalidTimecode(format!("'{}' is not HH:MM:SS,mmm", timestamp)))?;

    let field = |i: usize| -> Result<u64> {
        caps[i]
            .parse::<u64>()
            .map_err(|e| SubweaveError::InvalidTimecode(format!("'{}': {}", timestamp, e)))
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let secs = field(3)?;
    let millis = field(4)?;

    let total_millis = hours
        .checked_mul(60)
        .and_then(|m| m.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(secs))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(|| SubweaveError::InvalidTimecode(format!("'{}' is out of range", timestamp)))?;
    Ok(total_millis as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_to_timestamp() {
        assert_eq!(seconds_to_timestamp(0.0).unwrap(), "00:00:00,000");
        assert_eq!(seconds_to_timestamp(1.5).unwrap(), "00:00:01,500");
        assert_eq!(seconds_to_timestamp(65.123).unwrap(), "00:01:05,123");
        assert_eq!(seconds_to_timestamp(3661.5).unwrap(), "01:01:01,500");
        assert_eq!(seconds_to_timestamp(360000.0).unwrap(), "100:00:00,000");
    }

    #[test]
    fn millisecond_rounding_carries_over() {
        assert_eq!(seconds_to_timestamp(59.9996).unwrap(), "00:01:00,000");
        assert_eq!(seconds_to_timestamp(3599.9999).unwrap(), "01:00:00,000");
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        for bad in [-0.001, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                seconds_to_timestamp(bad),
                Err(SubweaveError::InvalidTimecode(_))
            ));
        }
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:01,500").unwrap(), 1.5);
        assert_eq!(parse_timestamp(" 01:01:01,500 ").unwrap(), 3661.5);
        assert_eq!(parse_timestamp("100:00:00,000").unwrap(), 360000.0);
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in [
            "00:00:01.500",
            "0:00:01,500",
            "00:60:00,000",
            "00:00:61,000",
            "00:00:01,50",
            "",
            "abc",
            "99999999999999999:00:00,000",
            "99999999999999999999999:00:00,000",
        ] {
            assert!(
                matches!(parse_timestamp(bad), Err(SubweaveError::InvalidTimecode(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn round_trip_within_a_millisecond() {
        let mut s = 0.0;
        while s < 7300.0 {
            let parsed = parse_timestamp(&seconds_to_timestamp(s).unwrap()).unwrap();
            assert!((parsed - s).abs() <= 0.001, "{s} came back as {parsed}");
            s += 0.3337;
        }
    }
}
