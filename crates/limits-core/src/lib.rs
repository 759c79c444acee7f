//! Adaptive concurrency limiting: estimate a safe number of concurrent
//! requests from latency gradient, and gate admission against it.
//!
//! The pipeline composes three layers:
//!
//! - a [`Limit`] estimator ([`Gradient2Limit`], or [`FixedLimit`] for
//!   testing/baselines) that turns RTT/inflight samples into an integer
//!   limit;
//! - a [`WindowedLimit`] that buffers per-thread samples into
//!   [`SampleRing`]s and folds them into one aggregate before each call into
//!   the estimator, decoupling the sampling hot path from estimator
//!   mutation;
//! - a [`Limiter`] ([`SimpleLimiter`]) that gates admission against the
//!   current limit and reports outcomes back through an [`AcquireGuard`].

pub mod buffered_window;
pub mod clock;
pub mod config;
pub mod error;
pub mod gradient;
pub mod invariants;
pub mod limit;
pub mod limiter;
pub mod measurement;
pub mod ring;
pub mod sample;
pub mod window;
pub mod windowed;

pub use clock::{Clock, FakeClock, SharedClock, SystemClock};
pub use config::{GradientConfig, WindowedConfig};
pub use error::LimiterError;
pub use gradient::Gradient2Limit;
pub use limit::{ChangeListener, FixedLimit, Limit, LimitPublisher};
pub use limiter::{AcquireGuard, Limiter, Outcome, SimpleLimiter};
pub use ring::SampleRing;
pub use sample::PackedSample;
pub use window::{AverageSampleWindow, SampleWindow};
pub use windowed::WindowedLimit;
