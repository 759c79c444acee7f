//! Debug-only invariant checks, named after the spec properties they guard
//! (spec §8). Compiled out entirely in release builds, same as
//! [`std::debug_assert!`].

/// INV-BOUNDS: a published limit never leaves `[min, max]`.
#[macro_export]
macro_rules! debug_assert_limit_in_bounds {
    ($limit:expr, $min:expr, $max:expr) => {
        debug_assert!(
            ($limit as f64) >= $min && ($limit as f64) <= $max,
            "limit {} escaped configured bounds [{}, {}]",
            $limit,
            $min,
            $max
        );
    };
}

/// INV-RING-BOUNDED: a ring never reports more buffered samples than its
/// capacity allows.
#[macro_export]
macro_rules! debug_assert_ring_bounded {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len < $capacity,
            "ring length {} reached capacity {}",
            $len,
            $capacity
        );
    };
}

/// INV-MONOTONIC-WINDOW: `next_update_time` only ever moves forward.
#[macro_export]
macro_rules! debug_assert_monotonic {
    ($prev:expr, $next:expr) => {
        debug_assert!(
            $next >= $prev,
            "expected monotonic progression, got {} after {}",
            $next,
            $prev
        );
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn bounds_macro_passes_within_range() {
        debug_assert_limit_in_bounds!(10, 1.0, 20.0);
    }

    #[test]
    #[should_panic(expected = "escaped configured bounds")]
    fn bounds_macro_panics_out_of_range() {
        debug_assert_limit_in_bounds!(21, 1.0, 20.0);
    }

    #[test]
    fn ring_bounded_macro_passes_under_capacity() {
        debug_assert_ring_bounded!(3, 4);
    }

    #[test]
    fn monotonic_macro_passes_on_equal_or_forward() {
        debug_assert_monotonic!(5u64, 5u64);
        debug_assert_monotonic!(5u64, 6u64);
    }
}
