//! Injectable randomness for the skip-list's node heights (spec §5: "no
//! global mutable state beyond a process-wide PRNG seed ... implementations
//! must accept an injected RNG to make tests deterministic").

use rand::RngCore;

/// Draws a skip-list node height. A thin wrapper over [`RngCore`] so the
/// skip-list can take `&mut dyn SkipListRng` instead of being generic over a
/// concrete RNG type.
pub trait SkipListRng {
    fn next_u32(&mut self) -> u32;
}

impl<T: RngCore + ?Sized> SkipListRng for T {
    fn next_u32(&mut self) -> u32 {
        RngCore::next_u32(self)
    }
}

/// Draws a height in `1..=max_height` with ~50% promotion odds per level,
/// matching the source's `1 + trailingZeros-ish` coin-flip climb (spec
/// §4.10).
pub fn random_height(rng: &mut dyn SkipListRng, max_height: usize) -> usize {
    let mut height = 1;
    while height < max_height && rng.next_u32() & 1 == 0 {
        height += 1;
    }
    height
}
