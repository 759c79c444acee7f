//! Per-worker lock-free SPSC ring buffer (spec §3 "Ring", §4.3).
//!
//! Each ring has exactly one producer and one consumer. The producer
//! (`offer`) never blocks: a full ring simply refuses the sample. The
//! consumer (the windowed driver, under its single-writer `updating` gate)
//! drains with `drain_into`.
//!
//! Memory ordering mirrors the teacher's `Ring<T>`: the producer publishes
//! `tail` with `Release` after writing the slot; the consumer synchronizes
//! with an `Acquire` load of `tail` before reading. `head` is written only
//! by the consumer and read with `Acquire` by the producer when its cached
//! view runs out of room.

use crate::sample::PackedSample;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Fixed-capacity SPSC ring of packed samples.
pub struct SampleRing {
    tail: CachePadded<AtomicU64>,
    head: CachePadded<AtomicU64>,
    buffer: Box<[AtomicU64]>,
    capacity: usize,
    is_power_of_two: bool,
    /// Count of samples refused because the ring was full (spec §5:
    /// "sampling loss under extreme burst is acceptable").
    overflow_count: CachePadded<AtomicUsize>,
}

// Safety: the single-producer/single-consumer discipline is enforced by
// construction (one `Producer` handle per ring, one consumer per windowed
// driver instance); the ring itself holds only plain u64 words.
unsafe impl Send for SampleRing {}
unsafe impl Sync for SampleRing {}

impl SampleRing {
    /// Creates a new ring with the given capacity (need not be a power of
    /// two, though power-of-two capacities take the masking fast path per
    /// spec §3).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, || AtomicU64::new(0));
        Self {
            tail: CachePadded::new(AtomicU64::new(0)),
            head: CachePadded::new(AtomicU64::new(0)),
            buffer: buffer.into_boxed_slice(),
            capacity,
            is_power_of_two: capacity & (capacity - 1) == 0,
            overflow_count: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    fn increment(&self, idx: u64) -> u64 {
        let next = idx + 1;
        if self.is_power_of_two {
            next & (self.capacity as u64 - 1)
        } else {
            next % self.capacity as u64
        }
    }

    /// Producer-side: offer a sample. Returns `false` if the ring is full.
    pub fn offer(&self, sample: PackedSample) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = self.increment(tail);
        if next_tail == self.head.load(Ordering::Acquire) {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
            #[cfg(feature = "tracing")]
            tracing::trace!(capacity = self.capacity, "sample ring full, dropping sample");
            return false;
        }
        self.buffer[tail as usize].store(sample.into_raw(), Ordering::Relaxed);
        self.tail.store(next_tail, Ordering::Release);
        crate::debug_assert_ring_bounded!(self.len(), self.capacity);
        true
    }

    /// Consumer-side: drains every sample committed at the moment this call
    /// began (bounded by the producer's committed tail at that instant, per
    /// spec §4.3), invoking `f` for each and returning the count drained.
    pub fn drain_into(&self, mut f: impl FnMut(PackedSample)) -> usize {
        let mut head = self.head.load(Ordering::Relaxed);
        let target_tail = self.tail.load(Ordering::Acquire);
        let mut drained = 0;
        while head != target_tail {
            let raw = self.buffer[head as usize].load(Ordering::Relaxed);
            f(PackedSample::from_raw(raw));
            head = self.increment(head);
            drained += 1;
        }
        self.head.store(head, Ordering::Release);
        crate::debug_assert_ring_bounded!(self.len(), self.capacity);
        drained
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        if tail >= head {
            (tail - head) as usize
        } else {
            (self.capacity as u64 - head + tail) as usize
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(n: u64) -> PackedSample {
        PackedSample::pack(Duration::from_nanos(n), (n % 100) as usize, n % 7 == 0)
    }

    #[test]
    fn offer_and_drain_preserve_order() {
        let ring = SampleRing::new(16);
        for i in 0..10 {
            assert!(ring.offer(sample(i)));
        }
        let mut seen = Vec::new();
        let drained = ring.drain_into(|s| seen.push(s.unpack().0.as_nanos() as u64));
        assert_eq!(drained, 10);
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
        assert!(ring.is_empty());
    }

    #[test]
    fn full_ring_refuses_offer() {
        let ring = SampleRing::new(4); // power of two: 3 usable slots
        let mut accepted = 0;
        for i in 0..10 {
            if ring.offer(sample(i)) {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 3);
        assert!(ring.overflow_count() > 0);
    }

    #[test]
    fn non_power_of_two_capacity_uses_modulo() {
        let ring = SampleRing::new(5);
        for i in 0..4 {
            assert!(ring.offer(sample(i)));
        }
        assert!(!ring.offer(sample(99)));
        let mut count = 0;
        ring.drain_into(|_| count += 1);
        assert_eq!(count, 4);
    }

    #[test]
    fn wraps_around_after_repeated_drains() {
        let ring = SampleRing::new(4);
        for round in 0..5u64 {
            for i in 0..3 {
                assert!(ring.offer(sample(round * 10 + i)));
            }
            let mut drained = 0;
            ring.drain_into(|_| drained += 1);
            assert_eq!(drained, 3);
        }
    }

    #[test]
    fn spsc_stress_single_thread_interleaved() {
        let ring = SampleRing::new(1024);
        let mut produced = 0u64;
        let mut consumed = 0u64;
        let mut next_expected = 0u64;
        while produced < 100_000 {
            let mut batch = 0;
            while batch < 7 && ring.offer(sample(produced)) {
                produced += 1;
                batch += 1;
            }
            consumed += ring.drain_into(|s| {
                assert_eq!(s.unpack().0.as_nanos() as u64, next_expected);
                next_expected += 1;
            }) as u64;
        }
        consumed += ring.drain_into(|_| {}) as u64;
        assert_eq!(produced, consumed + ring.overflow_count() as u64);
    }
}
