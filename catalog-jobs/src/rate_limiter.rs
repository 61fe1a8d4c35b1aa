//! Per-`(plugin, sourceId)` refresh cooldown gate (spec.md §4.6, §2 "Rate
//! Limiter"). Single-process state; a multi-replica deployment should back
//! this with the shared DB the same way the job queue is, but a single
//! queue-claim already prevents duplicate concurrent runs, so this only
//! needs to catch request-rate abuse within one replica's enqueue path.

use std::time::{Duration, Instant};

use dashmap::DashMap;

pub struct RateLimiter {
    cooldown: Duration,
    last_enqueued: DashMap<(String, String), Instant>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_enqueued: DashMap::new(),
        }
    }

    /// Returns `Ok(())` if a refresh may be enqueued now, or
    /// `Err(remaining)` with the cooldown time left.
    pub fn check(&self, plugin: &str, source_id: &str) -> Result<(), Duration> {
        let key = (plugin.to_string(), source_id.to_string());
        let now = Instant::now();

        if let Some(last) = self.last_enqueued.get(&key) {
            let elapsed = now.duration_since(*last);
            if elapsed < self.cooldown {
                return Err(self.cooldown - elapsed);
            }
        }

        self.last_enqueued.insert(key, now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_request_within_cooldown_is_rejected() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.check("models", "s1").is_ok());
        assert!(limiter.check("models", "s1").is_err());
    }

    #[test]
    fn different_sources_have_independent_cooldowns() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.check("models", "s1").is_ok());
        assert!(limiter.check("models", "s2").is_ok());
    }
}
