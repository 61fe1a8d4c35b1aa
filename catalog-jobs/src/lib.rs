//! Refresh job worker pool, rate limiter, and leader election (spec.md
//! §4.6, §4.11, §2 "Rate Limiter").

mod leader;
mod rate_limiter;
mod worker;

pub use leader::LeaderElection;
pub use rate_limiter::RateLimiter;
pub use worker::WorkerPool;
