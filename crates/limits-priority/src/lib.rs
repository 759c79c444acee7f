//! Priority admission backlog, blocking wrapper, and the skip-list priority
//! deque backing both (spec §4.8, §4.9, §4.10).
//!
//! Builds on [`limits_core`]'s [`SimpleLimiter`](limits_core::SimpleLimiter)
//! as the delegate every wrapper here recovers `LimitExceeded` rejections
//! from by queueing instead of failing the caller outright.

pub mod backlog;
pub mod blocking;
pub mod error;
pub mod priority;
pub mod rng;
pub mod skiplist;

pub use backlog::{PriorityConfig, PriorityGuard, PriorityLimiter};
pub use blocking::{BlockingGuard, BlockingLimiter};
pub use error::PriorityError;
pub use priority::Priority;
pub use rng::{random_height, SkipListRng};
pub use skiplist::{NodeId, SkipList};
