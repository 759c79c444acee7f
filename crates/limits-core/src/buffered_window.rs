//! Per-worker buffered sample window (spec §4.3).
//!
//! Wraps a delegate [`SampleWindow`] and fronts it with one
//! [`SampleRing`](crate::ring::SampleRing) per worker slot. `add_sample` is
//! the hot path: one pack plus one ring offer, off the accumulator entirely.
//! `snapshot` is called by the windowed driver while its single-writer
//! `updating` gate is held, so it is the only call path that touches the
//! delegate window and drains the rings — the delegate lives behind an
//! `UnsafeCell` for that reason, mirroring the single-writer cells in the
//! teacher's `Ring<T>`.

use crate::ring::SampleRing;
use crate::sample::PackedSample;
use crate::window::SampleWindow;
use std::cell::{Cell, UnsafeCell};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static NEXT_WORKER_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static WORKER_ID: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Resolves a stable, small worker index for the calling thread, capped at
/// `parallelism`. Rust has no `GOMAXPROCS`-style hook to pin a thread to an
/// integer id (spec §9), so the substitute is a thread-local slot assigned
/// once from a global counter; threads beyond `parallelism` share the last
/// slot (oversubscribed, not unsound — `SampleRing::offer` tolerates
/// concurrent producers, it just loses the single-producer throughput
/// benefit when oversubscribed).
fn worker_id(parallelism: usize) -> usize {
    WORKER_ID.with(|cell| {
        if let Some(id) = cell.get() {
            return id.min(parallelism - 1);
        }
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        cell.set(Some(id));
        if id >= parallelism {
            #[cfg(feature = "tracing")]
            tracing::trace!(id, parallelism, "worker id exceeds parallelism, oversubscribing last ring slot");
        }
        id.min(parallelism - 1)
    })
}

/// A [`SampleWindow`] backed by per-worker rings, decoupling the per-request
/// hot path from accumulator mutation (spec §4.3 rationale).
pub struct BufferedSampleWindow<W: SampleWindow> {
    delegate: UnsafeCell<W>,
    rings: Vec<SampleRing>,
    parallelism: usize,
}

// Safety: `delegate` is mutated only from `snapshot`, which callers must
// only invoke while holding the windowed driver's single-writer `updating`
// gate (spec §4.4). `rings` are individually Send+Sync SPSC buffers.
unsafe impl<W: SampleWindow> Sync for BufferedSampleWindow<W> {}

impl<W: SampleWindow> BufferedSampleWindow<W> {
    #[must_use]
    pub fn new(delegate: W, parallelism: usize, ring_capacity: usize) -> Self {
        assert!(parallelism > 0, "parallelism must be positive");
        let rings = (0..parallelism).map(|_| SampleRing::new(ring_capacity)).collect();
        Self {
            delegate: UnsafeCell::new(delegate),
            rings,
            parallelism,
        }
    }

    /// Offers a sample into the calling thread's ring. Overflow is silently
    /// dropped (spec §4.3).
    pub fn add_sample(&self, rtt: Duration, inflight: usize, dropped: bool) {
        let id = worker_id(self.parallelism);
        let packed = PackedSample::pack(rtt, inflight, dropped);
        self.rings[id].offer(packed);
    }

    /// Sum of currently buffered (undrained) samples across all rings. Used
    /// by the windowed driver to decide whether the window is ready.
    #[must_use]
    pub fn buffered_count(&self) -> usize {
        self.rings.iter().map(SampleRing::len).sum()
    }

    /// Resets the delegate, drains every ring into it, and runs `f` against
    /// the folded delegate — the aggregated view for this window (spec
    /// §4.3). Caller must hold the windowed driver's `updating` gate.
    pub fn snapshot<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        // SAFETY: caller holds the single-writer gate (see struct docs and
        // the `Sync` impl above), so no other thread observes `delegate`
        // concurrently with this mutable access.
        let delegate = unsafe { &mut *self.delegate.get() };
        delegate.reset();
        for ring in &self.rings {
            ring.drain_into(|packed| {
                let (rtt, inflight, dropped) = packed.unpack();
                delegate.add_sample(rtt, inflight, dropped);
            });
        }
        f(delegate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::AverageSampleWindow;

    #[test]
    fn snapshot_folds_single_thread_samples() {
        let w = BufferedSampleWindow::new(AverageSampleWindow::default(), 4, 64);
        for _ in 0..5 {
            w.add_sample(Duration::from_millis(10), 3, false);
        }
        assert_eq!(w.buffered_count(), 5);
        w.snapshot(|snap| {
            assert_eq!(snap.sample_counts(), (5, 0));
            assert_eq!(snap.tracked_rtt(), Duration::from_millis(10));
        });
        assert_eq!(w.buffered_count(), 0);
    }

    #[test]
    fn snapshot_aggregates_across_threads() {
        use std::sync::Arc;
        let w = Arc::new(BufferedSampleWindow::new(AverageSampleWindow::default(), 4, 256));
        let mut handles = Vec::new();
        for t in 0..4 {
            let w = Arc::clone(&w);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    w.add_sample(Duration::from_millis(1 + t), 1, false);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(w.buffered_count(), 200);
    }
}
