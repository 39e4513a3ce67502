//! Conversions between `Duration` and signed microsecond deltas.
//!
//! Deadlines are kept as signed microseconds so that "already overdue"
//! is representable; these helpers keep the conversions saturating.

use std::time::Duration;

/// Integer division rounding toward positive infinity.
///
/// `numerator` must be non-negative and `denominator` positive.
pub fn div_round_up(numerator: i64, denominator: i64) -> i64 {
    debug_assert!(numerator >= 0, "div_round_up of negative value {numerator}");
    debug_assert!(denominator > 0, "div_round_up by non-positive {denominator}");
    numerator / denominator + i64::from(numerator % denominator != 0)
}

/// Microseconds in `d`, saturating at `i64::MAX`.
pub fn duration_to_us(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

/// A microsecond delta as a `Duration`, clamping negative deltas to zero.
pub fn us_to_duration(us: i64) -> Duration {
    Duration::from_micros(u64::try_from(us).unwrap_or(0))
}

/// Round a microsecond delta up to whole milliseconds.
///
/// Used for wake deadlines: waking a little late is harmless, waking early
/// costs a wasted loop iteration.
pub fn ceil_millis(us: i64) -> Duration {
    if us <= 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(div_round_up(us, 1_000) as u64)
}
