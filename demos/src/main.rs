//! Runnable illustration of the adaptive limiter stack: a [`PriorityLimiter`]
//! backlogging a [`WindowedLimit`]-wrapped [`Gradient2Limit`] against a
//! simulated downstream that degrades partway through the run. Not part of
//! the public API — plays the role the teacher gives its own `bin/demo.rs`.
//!
//! ```bash
//! cargo run -p limits-demo
//! ```

use limits_core::{
    Gradient2Limit, GradientConfig, Outcome, SharedClock, SimpleLimiter, SystemClock,
    WindowedConfig, WindowedLimit,
};
use limits_priority::{PriorityConfig, PriorityError, PriorityLimiter};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WORKERS: usize = 12;
const REQUESTS_PER_WORKER: usize = 40;
/// After this many requests per worker, the simulated downstream slows down
/// and starts shedding load, to show the estimator reacting and the backlog
/// starting to evict/time out low-priority waiters.
const DEGRADE_AFTER: usize = 20;

#[derive(Default)]
struct Stats {
    admitted: AtomicU64,
    dropped: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
    timed_out: AtomicU64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("adaptive concurrency limiter demo");
    println!("workers: {WORKERS}, requests/worker: {REQUESTS_PER_WORKER}\n");

    let clock: SharedClock = Arc::new(SystemClock::new());

    let estimator: Arc<dyn limits_core::Limit> = Arc::new(WindowedLimit::new(
        Gradient2Limit::new(GradientConfig {
            initial_limit: 8.0,
            min_limit: 2.0,
            max_limit: 64.0,
            ..GradientConfig::default()
        }),
        WindowedConfig {
            min_window: Duration::from_millis(100),
            max_window: Duration::from_millis(250),
            window_size: 20,
            ..WindowedConfig::default()
        },
        Arc::clone(&clock),
    ));
    let delegate = SimpleLimiter::new(estimator, Arc::clone(&clock));

    let backlog = PriorityLimiter::new(
        delegate.clone(),
        PriorityConfig {
            backlog_size: 16,
            timeout: Duration::from_millis(200),
            fifo_mode: false,
        },
        Arc::clone(&clock),
        Box::new(StdRng::from_entropy()),
    );

    let stats = Arc::new(Stats::default());
    let start = Instant::now();

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker_id| {
            let backlog = backlog.clone();
            let stats = Arc::clone(&stats);
            thread::spawn(move || run_worker(worker_id, backlog, stats))
        })
        .collect();

    let report = {
        let backlog = backlog.clone();
        let stats = Arc::clone(&stats);
        thread::spawn(move || {
            while Instant::now().duration_since(start) < Duration::from_secs(5) {
                thread::sleep(Duration::from_millis(300));
                println!(
                    "  limit={:<4} backlog={:<3} admitted={:<5} dropped={:<4} rejected={:<4} evicted={:<4} timed_out={:<4}",
                    backlog.get_limit(),
                    backlog.backlog_len(),
                    stats.admitted.load(Ordering::Relaxed),
                    stats.dropped.load(Ordering::Relaxed),
                    stats.rejected.load(Ordering::Relaxed),
                    stats.evicted.load(Ordering::Relaxed),
                    stats.timed_out.load(Ordering::Relaxed),
                );
            }
        })
    };

    for h in handles {
        let _ = h.join();
    }
    let _ = report.join();

    println!("\nfinished in {:?}", start.elapsed());
    println!(
        "final: admitted={} dropped={} rejected={} evicted={} timed_out={}",
        stats.admitted.load(Ordering::Relaxed),
        stats.dropped.load(Ordering::Relaxed),
        stats.rejected.load(Ordering::Relaxed),
        stats.evicted.load(Ordering::Relaxed),
        stats.timed_out.load(Ordering::Relaxed),
    );
}

fn run_worker(worker_id: usize, backlog: PriorityLimiter, stats: Arc<Stats>) {
    let mut rng = StdRng::seed_from_u64(worker_id as u64 ^ 0x9E37_79B9);
    for i in 0..REQUESTS_PER_WORKER {
        let degraded = i >= DEGRADE_AFTER;
        let priority = rng.gen_range(-5..=5);

        match backlog.acquire(priority, u64::MAX) {
            Ok(guard) => {
                let latency = simulate_downstream(&mut rng, degraded);
                thread::sleep(latency);
                if degraded && rng.gen_bool(0.2) {
                    stats.dropped.fetch_add(1, Ordering::Relaxed);
                    guard.complete(Outcome::Dropped);
                } else {
                    stats.admitted.fetch_add(1, Ordering::Relaxed);
                    guard.complete(Outcome::Success);
                }
            }
            Err(PriorityError::Evicted) => {
                stats.evicted.fetch_add(1, Ordering::Relaxed);
            }
            Err(PriorityError::WaitTimeout) => {
                stats.timed_out.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                stats.rejected.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// A few milliseconds normally; an order of magnitude slower, with noise,
/// once the run enters its "degraded" phase.
fn simulate_downstream(rng: &mut StdRng, degraded: bool) -> Duration {
    let base_ms = if degraded { 40 } else { 4 };
    let jitter_ms = rng.gen_range(0..base_ms.max(1));
    Duration::from_millis(base_ms + jitter_ms)
}
