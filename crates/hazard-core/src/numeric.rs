//! Integer helpers shared by the range types

use num_integer::Integer;

/// Mathematical modulo: the result is always in `[0, n)`, also for negative
/// `x`.
///
/// Shifted address arithmetic regularly produces negative intermediates, so
/// `%` (which keeps the sign of `x`) is never what the range code wants.
///
/// # Panics
///
/// Panics if `n <= 0`.
#[inline]
pub fn mod_n(x: i64, n: i64) -> i64 {
    assert!(n > 0, "modulus must be positive, got {n}");
    x.rem_euclid(n)
}

/// Least common multiple of two strides, computed as `a / gcd(a, b) * b` so
/// the intermediate product never exceeds the result.
#[inline]
pub fn lcm_u64(a: u64, b: u64) -> u64 {
    a / a.gcd(&b) * b
}

/// Round `value` up to the next multiple of `multiple`.
#[inline]
pub fn round_up<T: num_traits::PrimInt>(value: T, multiple: T) -> T {
    let rem = value % multiple;
    if rem.is_zero() {
        value
    } else {
        value + (multiple - rem)
    }
}
