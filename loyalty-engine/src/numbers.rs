//! Numeric conversion helpers centralizing lossy casts.

use num_traits::cast::cast;

/// Convert an event count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn count_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert a collection length to f64, returning 0.0 if the cast fails.
#[must_use]
pub fn len_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Narrow a signed count to `u64`, returning `None` for negative values.
#[must_use]
pub fn non_negative_count(value: i64) -> Option<u64> {
    u64::try_from(value).ok()
}

/// Sum a slice of f64 values in order using compensated (Kahan) summation.
#[must_use]
pub fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for value in values {
        let adjusted = value - compensation;
        let next = sum + adjusted;
        compensation = (next - sum) - adjusted;
        sum = next;
    }
    sum
}
