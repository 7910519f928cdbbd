//! Cross-cutting primitives shared by every ManLab component: the
//! fixed-capacity circular buffer and the per-subject rate limiter. No
//! I/O lives here — everything is synchronous and dependency-free beyond
//! concurrency primitives, so it can be pulled into any engine crate
//! without dragging in tokio.

mod buffer;
mod ratelimit;

pub use buffer::CircularBuffer;
pub use ratelimit::{LimitCheck, RateLimitConfig, RateLimiter};
