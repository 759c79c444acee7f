//! Packed sample representation (spec §3): a `(rtt, inflight, dropped)`
//! triple packed into a single 64-bit word so it can be pushed through the
//! per-worker ring with one atomic store.

use std::time::Duration;

/// Maximum representable RTT: 48 bits of nanoseconds (~3.25 days).
pub const MAX_RTT_NANOS: u64 = (1 << 48) - 1;
/// Maximum representable inflight count: 15 bits.
pub const MAX_INFLIGHT: usize = (1 << 15) - 1;

/// A packed `(rtt, inflight, dropped)` sample: `rtt << 16 | inflight << 1 | drop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedSample(u64);

impl PackedSample {
    /// Packs a sample. RTT and inflight are silently clamped to their
    /// representable ranges — this is a lossy encoding for the sampling
    /// hot path, not a general-purpose serialization format.
    #[must_use]
    pub fn pack(rtt: Duration, inflight: usize, dropped: bool) -> Self {
        let rtt_nanos = (rtt.as_nanos() as u64).min(MAX_RTT_NANOS);
        let inflight = inflight.min(MAX_INFLIGHT) as u64;
        let bits = (rtt_nanos << 16) | (inflight << 1) | u64::from(dropped);
        Self(bits)
    }

    #[must_use]
    pub fn unpack(self) -> (Duration, usize, bool) {
        let rtt = Duration::from_nanos(self.0 >> 16);
        let inflight = ((self.0 >> 1) & 0x7FFF) as usize;
        let dropped = self.0 & 0x1 == 1;
        (rtt, inflight, dropped)
    }

    pub(crate) fn into_raw(self) -> u64 {
        self.0
    }

    pub(crate) fn from_raw(bits: u64) -> Self {
        Self(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trips_representative_values() {
        for (rtt_ms, inflight, dropped) in [
            (0u64, 0usize, false),
            (1, 1, true),
            (250, 32767, false),
            (u64::MAX / 2, 100, true),
        ] {
            let rtt = Duration::from_nanos(rtt_ms.min(MAX_RTT_NANOS));
            let packed = PackedSample::pack(rtt, inflight.min(MAX_INFLIGHT), dropped);
            let (r, i, d) = packed.unpack();
            assert_eq!(r, rtt);
            assert_eq!(i, inflight.min(MAX_INFLIGHT));
            assert_eq!(d, dropped);
        }
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trip(rtt_nanos in 0u64..=MAX_RTT_NANOS, inflight in 0usize..=MAX_INFLIGHT, dropped in any::<bool>()) {
            let rtt = Duration::from_nanos(rtt_nanos);
            let packed = PackedSample::pack(rtt, inflight, dropped);
            let (r, i, d) = packed.unpack();
            prop_assert_eq!(r, rtt);
            prop_assert_eq!(i, inflight);
            prop_assert_eq!(d, dropped);
        }
    }
}
