use std::cmp::Ordering;

use num_bigint::BigUint;

use crate::{MetricError, ensure_same_len};

/// Returns the distance between `x` and `y` in big-endian binary format.
///
/// Fails if the addresses differ in length.
pub fn distance_raw(x: &[u8], y: &[u8]) -> Result<Vec<u8>, MetricError> {
    ensure_same_len(x.len(), y.len())?;
    Ok(x.iter().zip(y).map(|(a, b)| a ^ b).collect())
}

/// Returns the distance between `x` and `y` as a comparable unsigned integer.
///
/// Fails if the addresses differ in length.
pub fn distance(x: &[u8], y: &[u8]) -> Result<BigUint, MetricError> {
    distance_raw(x, y).map(|raw| BigUint::from_bytes_be(&raw))
}

/// Compares `x` and `y` to `a` in terms of the XOR distance metric.
///
/// It returns:
///   - `Ordering::Greater` if `x` is closer to `a` than `y`
///   - `Ordering::Equal` if `x` and `y` are equidistant from `a` (this means that `x` and `y`
///     are the same address)
///   - `Ordering::Less` if `x` is farther from `a` than `y`
///
/// Fails if the three addresses are not all of equal length.
pub fn distance_cmp(a: &[u8], x: &[u8], y: &[u8]) -> Result<Ordering, MetricError> {
    ensure_same_len(a.len(), x.len())?;
    ensure_same_len(a.len(), y.len())?;
    Ok(cmp_unchecked(a, x, y))
}

#[inline]
pub(crate) fn cmp_unchecked(a: &[u8], x: &[u8], y: &[u8]) -> Ordering {
    for ((a, x), y) in a.iter().zip(x).zip(y) {
        let dx = x ^ a;
        let dy = y ^ a;
        if dx != dy {
            return match dx < dy {
                true => Ordering::Greater,
                false => Ordering::Less,
            };
        }
    }

    Ordering::Equal
}
