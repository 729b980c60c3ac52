//! Packet timestamp conversion.
//!
//! Packets carry wall-clock stamps like `2019-03-01 08:15:30.123456` with an
//! optional fractional part. The trace tool that produced them ran in a fixed
//! UTC+8 environment, so conversion adds a constant 28800-second offset on
//! top of reading the fields as UTC. Comparisons inside the pipeline are all
//! relative; only `--range` arguments observe the absolute values.

use chrono::NaiveDateTime;

pub const UTC8_OFFSET_SECS: i64 = 28_800;

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

fn parse_stamp(stamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(stamp.trim(), STAMP_FORMAT).ok()
}

/// Second-resolution conversion; the fractional part is accepted and ignored.
/// Returns `None` when the stamp does not match the expected shape.
pub fn stamp_to_seconds(stamp: &str) -> Option<i64> {
    let parsed = parse_stamp(stamp)?;
    Some(parsed.and_utc().timestamp() + UTC8_OFFSET_SECS)
}

/// Microsecond-resolution conversion used by dedup and reorder.
pub fn stamp_to_micros(stamp: &str) -> Option<i64> {
    let parsed = parse_stamp(stamp)?.and_utc();
    let seconds = parsed.timestamp() + UTC8_OFFSET_SECS;
    Some(seconds * 1_000_000 + i64::from(parsed.timestamp_subsec_micros()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_carries_the_fixed_offset() {
        assert_eq!(stamp_to_seconds("1970-01-01 00:00:00"), Some(UTC8_OFFSET_SECS));
        assert_eq!(
            stamp_to_micros("1970-01-01 00:00:00"),
            Some(UTC8_OFFSET_SECS * 1_000_000)
        );
    }

    #[test]
    fn fraction_is_optional_and_ignored_at_second_resolution() {
        assert_eq!(
            stamp_to_seconds("2019-03-01 08:15:30"),
            stamp_to_seconds("2019-03-01 08:15:30.999999")
        );
    }

    #[test]
    fn micros_resolve_the_fraction() {
        let whole = stamp_to_micros("2019-03-01 08:15:30").unwrap();
        let frac = stamp_to_micros("2019-03-01 08:15:30.000042").unwrap();
        assert_eq!(frac - whole, 42);
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        assert_eq!(
            stamp_to_seconds(" 2019-03-01 08:15:30 "),
            stamp_to_seconds("2019-03-01 08:15:30")
        );
    }

    #[test]
    fn malformed_stamps_are_rejected() {
        assert_eq!(stamp_to_seconds("timestamp N/A"), None);
        assert_eq!(stamp_to_seconds("2019-03-01"), None);
        assert_eq!(stamp_to_micros("yesterday"), None);
        assert_eq!(stamp_to_micros(""), None);
    }

    #[test]
    fn ordering_follows_wall_clock() {
        let a = stamp_to_micros("2019-03-01 08:15:30.000001").unwrap();
        let b = stamp_to_micros("2019-03-01 08:15:30.000002").unwrap();
        assert!(a < b);
    }
}
