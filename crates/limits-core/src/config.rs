use std::sync::Arc;
use std::time::Duration;

/// Queue-size headroom as a function of the current estimated limit. Boxed
/// rather than a bare function pointer so callers can substitute a
/// heuristic that closes over its own state, not just a top-level `fn`.
pub type QueueSize = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Tunables for [`crate::gradient::Gradient2Limit`] (spec §6).
#[derive(Clone)]
pub struct GradientConfig {
    pub initial_limit: f64,
    pub min_limit: f64,
    pub max_limit: f64,
    /// Window size and warmup window for the long-term RTT EMA.
    pub long_window: usize,
    pub long_warmup_window: usize,
    pub smoothing: f64,
    pub tolerance: f64,
    /// Defaults to the piecewise function in spec §4.5.
    pub queue_size: QueueSize,
}

impl std::fmt::Debug for GradientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientConfig")
            .field("initial_limit", &self.initial_limit)
            .field("min_limit", &self.min_limit)
            .field("max_limit", &self.max_limit)
            .field("long_window", &self.long_window)
            .field("long_warmup_window", &self.long_warmup_window)
            .field("smoothing", &self.smoothing)
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

/// Default `queue_size` heuristic from spec §4.5: `≤2 → 0.5, <10 → 1, <20 → 2, else 4`.
pub fn default_queue_size(estimated_limit: f64) -> f64 {
    if estimated_limit <= 2.0 {
        0.5
    } else if estimated_limit < 10.0 {
        1.0
    } else if estimated_limit < 20.0 {
        2.0
    } else {
        4.0
    }
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            initial_limit: 20.0,
            min_limit: 1.0,
            max_limit: 200.0,
            long_window: 600,
            long_warmup_window: 10,
            smoothing: 0.2,
            tolerance: 1.5,
            queue_size: Arc::new(default_queue_size),
        }
    }
}

/// Tunables for [`crate::windowed::WindowedLimit`] (spec §6).
#[derive(Debug, Clone, Copy)]
pub struct WindowedConfig {
    pub min_window: Duration,
    pub max_window: Duration,
    pub min_rtt_threshold: Duration,
    pub window_size: usize,
    /// `rate` argument to [`crate::window::SampleWindow::did_drop`] (spec §4.2).
    pub drop_rate_threshold_pct: u32,
    /// Upper bound on the per-worker ring capacity (spec §4.3). Must be a
    /// power of two for the masking fast path.
    pub ring_capacity: usize,
    /// Upper bound on the number of distinct worker slots (spec §4.3).
    pub parallelism: usize,
}

impl Default for WindowedConfig {
    fn default() -> Self {
        Self {
            min_window: Duration::from_secs(1),
            max_window: Duration::from_secs(1),
            min_rtt_threshold: Duration::from_micros(100),
            window_size: 10,
            drop_rate_threshold_pct: 0,
            ring_capacity: 256,
            parallelism: 32,
        }
    }
}
