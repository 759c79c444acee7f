//! Gradient-based limit estimator (spec §4.5).

use crate::config::GradientConfig;
use crate::limit::{ChangeListener, Limit, LimitPublisher};
use crate::measurement::ExpAvgMeasurement;
use std::sync::Mutex;
use std::time::Duration;

struct EstimatorState {
    estimated_limit: f64,
    last_rtt: Duration,
    long_rtt: ExpAvgMeasurement,
}

/// Produces a new integer limit from each windowed sample using the ratio of
/// long-term to short-term RTT as a multiplicative gradient (spec §4.5).
pub struct Gradient2Limit {
    publisher: LimitPublisher,
    state: Mutex<EstimatorState>,
    config: GradientConfig,
}

impl Gradient2Limit {
    #[must_use]
    pub fn new(config: GradientConfig) -> Self {
        let initial = config.initial_limit.clamp(config.min_limit, config.max_limit);
        Self {
            publisher: LimitPublisher::new("gradient2", initial as usize),
            state: Mutex::new(EstimatorState {
                estimated_limit: initial,
                last_rtt: Duration::ZERO,
                long_rtt: ExpAvgMeasurement::new(config.long_window, config.long_warmup_window),
            }),
            config,
        }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(GradientConfig::default())
    }

    /// The float-precision estimate before truncation to the published
    /// integer limit. Exposed for tests asserting convergence (spec §8).
    #[must_use]
    pub fn estimated_limit(&self) -> f64 {
        self.state.lock().unwrap().estimated_limit
    }
}

impl Limit for Gradient2Limit {
    fn get_limit(&self) -> usize {
        self.publisher.get()
    }

    fn on_sample(&self, _start_nanos: u64, rtt: Duration, inflight: usize, dropped: bool) {
        let _ = dropped; // drop signal folds into rtt/inflight upstream via the windowed driver
        let mut state = self.state.lock().unwrap();

        let long_rtt = state.long_rtt.add(rtt.as_nanos() as f64);
        state.last_rtt = rtt;
        let short_rtt = rtt.as_nanos() as f64;

        // Recovery damping: after a prior overload the long RTT EMA lags
        // behind a now-recovered short RTT; decay it directly so the
        // estimator doesn't stay throttled waiting for the EMA to catch up.
        let long_rtt = if short_rtt > 0.0 && long_rtt / short_rtt > 2.0 {
            state.long_rtt.update(|v| v * 0.95);
            state.long_rtt.get()
        } else {
            long_rtt
        };

        let new_limit_int = {
            let app_limited = (inflight as f64) < state.estimated_limit / 2.0;
            if !app_limited && short_rtt > 0.0 {
                let gradient = (self.config.tolerance * long_rtt / short_rtt).clamp(0.5, 1.0);
                let queue_size = (self.config.queue_size)(state.estimated_limit);
                let raw = state.estimated_limit * gradient + queue_size;
                let smoothed =
                    state.estimated_limit * (1.0 - self.config.smoothing) + raw * self.config.smoothing;
                state.estimated_limit = smoothed.clamp(self.config.min_limit, self.config.max_limit);
                crate::debug_assert_limit_in_bounds!(
                    state.estimated_limit,
                    self.config.min_limit,
                    self.config.max_limit
                );
            }
            state.estimated_limit as usize
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            new_limit = new_limit_int,
            short_rtt_ns = short_rtt,
            long_rtt_ns = long_rtt,
            inflight,
            "gradient estimator published limit"
        );

        drop(state);
        self.publisher.set(new_limit_int);
    }

    fn notify_change(&self, listener: ChangeListener) {
        self.publisher.notify_change(listener);
    }

    fn identity(&self) -> &str {
        self.publisher.identity()
    }
}
