//! Windowed update driver (spec §4.4): gates when the estimator runs and
//! folds buffered per-worker samples into a single snapshot before handing
//! them to the wrapped [`Limit`].
//!
//! Two divergent gating conditions exist in the source (spec §9 Open
//! Questions): this implementation follows "advance when overdue"
//! (`end_time > next_update_time`), not the inverted variant.

use crate::buffered_window::BufferedSampleWindow;
use crate::clock::SharedClock;
use crate::config::WindowedConfig;
use crate::limit::{ChangeListener, Limit};
use crate::window::{AverageSampleWindow, SampleWindow};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// Wraps a delegate [`Limit`], buffering samples per-worker and invoking the
/// delegate only once per completed window (spec §4.4).
pub struct WindowedLimit<L: Limit> {
    delegate: L,
    clock: SharedClock,
    config: WindowedConfig,
    sample: BufferedSampleWindow<AverageSampleWindow>,
    next_update_time: AtomicU64,
    updating: AtomicBool,
}

impl<L: Limit> WindowedLimit<L> {
    #[must_use]
    pub fn new(delegate: L, config: WindowedConfig, clock: SharedClock) -> Self {
        let start = clock.now_nanos();
        Self {
            delegate,
            clock,
            sample: BufferedSampleWindow::new(
                AverageSampleWindow::new(config.drop_rate_threshold_pct),
                config.parallelism,
                config.ring_capacity,
            ),
            next_update_time: AtomicU64::new(start),
            config,
            updating: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn delegate(&self) -> &L {
        &self.delegate
    }

    fn window_ready(&self) -> bool {
        self.sample.buffered_count() >= self.config.window_size
    }
}

impl<L: Limit> Limit for WindowedLimit<L> {
    fn get_limit(&self) -> usize {
        self.delegate.get_limit()
    }

    fn on_sample(&self, start_nanos: u64, rtt: Duration, inflight: usize, dropped: bool) {
        if rtt < self.config.min_rtt_threshold {
            // Pathologically small RTTs (e.g. a local loop) are not
            // evidence about downstream capacity (spec §4.4 step 1).
            return;
        }

        self.sample.add_sample(rtt, inflight, dropped);

        let end_nanos = start_nanos + rtt.as_nanos() as u64;
        let next = self.next_update_time.load(Ordering::Acquire);
        if end_nanos <= next {
            return;
        }
        if self
            .updating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        // Re-check under the claimed gate: another thread may have already
        // advanced `next_update_time` past `end_nanos` between our first
        // load and winning the CAS.
        let next = self.next_update_time.load(Ordering::Acquire);
        if end_nanos > next {
            // Readiness is decided on the pre-drain buffered count, and the
            // next-window candidate comes from this sample's own `rtt` —
            // `snapshot()` drains every ring, so calling it here just to peek
            // a candidate would empty the window before `window_ready()` ever
            // saw it (the delegate is only snapshotted once, in the `ready`
            // branch below).
            let ready = self.window_ready();
            let window = rtt.clamp(self.config.min_window, self.config.max_window);
            let new_next = end_nanos + window.as_nanos() as u64;
            crate::debug_assert_monotonic!(next, new_next);
            self.next_update_time.store(new_next, Ordering::Release);

            if ready {
                self.sample.snapshot(|w| {
                    let tracked_rtt = w.tracked_rtt();
                    let peak_inflight = w.peak_inflight();
                    let did_drop = w.did_drop();
                    #[cfg(feature = "tracing")]
                    tracing::trace!(
                        ?tracked_rtt,
                        peak_inflight,
                        did_drop,
                        "windowed driver folding window into estimator"
                    );
                    self.delegate.on_sample(start_nanos, tracked_rtt, peak_inflight, did_drop);
                });
            }
        }

        self.updating.store(false, Ordering::Release);
    }

    fn notify_change(&self, listener: ChangeListener) {
        self.delegate.notify_change(listener);
    }

    fn identity(&self) -> &str {
        self.delegate.identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::gradient::Gradient2Limit;
    use std::sync::Arc;

    fn driver(window_size: usize) -> WindowedLimit<Gradient2Limit> {
        let clock: SharedClock = Arc::new(FakeClock::new());
        WindowedLimit::new(
            Gradient2Limit::with_defaults(),
            WindowedConfig {
                min_window: Duration::from_millis(1),
                max_window: Duration::from_millis(1),
                min_rtt_threshold: Duration::from_micros(1),
                window_size,
                ..WindowedConfig::default()
            },
            clock,
        )
    }

    #[test]
    fn samples_below_min_rtt_threshold_are_ignored() {
        let wl = driver(1);
        wl.on_sample(0, Duration::from_nanos(100), 1, false);
        assert_eq!(wl.sample.buffered_count(), 0);
    }

    #[test]
    fn estimator_runs_only_once_window_size_is_reached() {
        let wl = driver(5);
        let mut start = 0u64;
        for _ in 0..4 {
            wl.on_sample(start, Duration::from_millis(2), 10, false);
            start += 2_000_000 + 1_000_000; // advance well past next_update_time each call
        }
        // Not enough samples yet to satisfy window_size even though the
        // gate has fired repeatedly; delegate limit stays at its initial
        // value because `on_sample` is only forwarded when ready.
        assert_eq!(wl.get_limit(), 20);
        let before = wl.delegate().estimated_limit();
        wl.on_sample(start, Duration::from_millis(2), 10, false);
        // Fifth sample completes the window: the buffered samples are
        // drained and the delegate actually observes a folded sample.
        assert_eq!(wl.sample.buffered_count(), 0);
        assert!(wl.delegate().estimated_limit() > before);
    }

    #[test]
    fn gate_skips_updates_before_next_update_time() {
        let wl = driver(1);
        wl.on_sample(0, Duration::from_millis(2), 10, false);
        let buffered_after_first = wl.sample.buffered_count();
        assert_eq!(buffered_after_first, 0); // window_size=1 triggers immediately
        // A second sample whose end_time does not pass next_update_time is
        // buffered but does not re-trigger the estimator immediately.
        wl.on_sample(2_000_001, Duration::from_millis(2), 10, false);
    }
}
