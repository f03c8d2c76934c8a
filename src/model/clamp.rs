//! Device bandwidth clamping against the node it hangs off.

use serde::Serialize;

/// Effective guaranteed rate (`min`) and ceiling (`max`) for one direction, in Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateBounds {
    pub min: u32,
    pub max: u32,
}

/// Clamp a device's configured bounds to its parent's capacity.
///
/// The ceiling never exceeds the parent and the guarantee never exceeds the ceiling. Applied
/// once per direction.
pub fn clamp(device_min: u32, device_max: u32, parent_capacity: u32) -> RateBounds {
    let max = device_max.min(parent_capacity);
    let min = device_min.min(max);
    RateBounds { min, max }
}

/// Round a fractional Mbps value half to even, the way the operator's config tooling always has.
///
/// `None` when the rounded value is not a whole `u32` (negative, NaN, or too large).
pub fn checked_mbps(value: f64) -> Option<u32> {
    let rounded = value.round_ties_even();
    (rounded >= 0.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}

/// A quarter of `capacity`, rounded half to even.
pub fn quarter_mbps(capacity: u32) -> u32 {
    let (q, r) = (capacity / 4, capacity % 4);
    if r > 2 || (r == 2 && q % 2 == 1) { q + 1 } else { q }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn within_bounds_is_untouched() {
        assert_eq!(clamp(10, 20, 100), RateBounds { min: 10, max: 20 });
    }

    #[test]
    fn ceiling_and_guarantee_clamp_to_parent() {
        // max 30 over a 20 Mbps parent; min 25 then exceeds the clamped max.
        assert_eq!(clamp(25, 30, 20), RateBounds { min: 20, max: 20 });
    }

    #[test]
    fn guarantee_above_own_ceiling_is_pulled_down() {
        assert_eq!(clamp(50, 40, 100), RateBounds { min: 40, max: 40 });
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(checked_mbps(125.0), Some(125));
        assert_eq!(checked_mbps(0.5), Some(0));
        assert_eq!(checked_mbps(2.5), Some(2));
        assert_eq!(checked_mbps(3.5), Some(4));
        assert_eq!(checked_mbps(10.9), Some(11));
    }

    #[test]
    fn out_of_range_rounding_is_reported() {
        assert_eq!(checked_mbps(f64::from(u32::MAX)), Some(u32::MAX));
        assert_eq!(checked_mbps(1e12), None);
        assert_eq!(checked_mbps(-3.0), None);
        assert_eq!(checked_mbps(f64::NAN), None);
        assert_eq!(checked_mbps(f64::INFINITY), None);
    }

    #[test]
    fn quarter_rounds_half_even() {
        assert_eq!(quarter_mbps(500), 125);
        assert_eq!(quarter_mbps(50), 12);
        assert_eq!(quarter_mbps(54), 14);
        assert_eq!(quarter_mbps(3), 1);
        assert_eq!(quarter_mbps(1), 0);
        assert_eq!(quarter_mbps(u32::MAX), 1 << 30);
    }

    proptest! {
        #[test]
        fn prop_quarter_matches_float_rounding(cap in 0u32..10_000_000) {
            prop_assert_eq!(Some(quarter_mbps(cap)), checked_mbps(f64::from(cap) / 4.0));
        }

        #[test]
        fn prop_min_le_max_le_parent(min in 1u32..100_000, max in 1u32..100_000, parent in 1u32..100_000) {
            let b = clamp(min, max, parent);
            prop_assert!(b.min <= b.max);
            prop_assert!(b.max <= parent);
            prop_assert!(b.max <= max);
            prop_assert!(b.min <= min);
        }
    }
}
