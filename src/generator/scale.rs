/// Nanoseconds in one millisecond.
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Convert a millisecond measurement to nanoseconds. Saturates instead of
/// wrapping; realistic inputs stay far below `i64::MAX / 1e6`.
pub fn to_nanoseconds(ms: i64) -> i64 {
    ms.saturating_mul(NANOS_PER_MILLI)
}
