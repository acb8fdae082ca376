//! Utility maths functions
//!
//! These work over both integer and floating point types. For integers every
//! division truncates toward zero, so the order of operations below matters.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Num;

/// Map a value from one range into another.
///
/// The scaling is applied before the division so that integer maps keep
/// their resolution.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Num + Copy
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Limit a value to the range `[min, max]`.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: PartialOrd + Copy
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Limit a value to the range `[min, max]`, also returning `true` if the
/// value was already within range.
pub fn clamp_checked<T>(value: &T, min: &T, max: &T) -> (T, bool)
where
    T: PartialOrd + Copy
{
    let clamped = clamp(value, min, max);
    (clamped, clamped == *value)
}

/// The midpoint of a range, `(min + max)/2`.
pub fn midpoint<T>(min: T, max: T) -> T
where
    T: Num + Copy
{
    (min + max) / (T::one() + T::one())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0f64, 1f64), (-1f64, 1f64), 0.5), 0.0);
        assert_eq!(lin_map((172i32, 1811), (-1000, 1000), 1811), 1000);
        assert_eq!(lin_map((172i32, 1811), (-1000, 1000), 172), -1000);

        // Integer maps truncate
        assert_eq!(lin_map((0i32, 3), (0, 10), 1), 3);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(&5, &-3, &3), 3);
        assert_eq!(clamp(&-5, &-3, &3), -3);
        assert_eq!(clamp(&1, &-3, &3), 1);
        assert_eq!(clamp_checked(&1, &-3, &3), (1, true));
        assert_eq!(clamp_checked(&4, &-3, &3), (3, false));
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(midpoint(-1024i32, 1024), 0);
        assert_eq!(midpoint(0i32, 255), 127);
        assert_eq!(midpoint(-100i32, 101), 0);
    }
}
