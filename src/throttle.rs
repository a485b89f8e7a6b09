//! Publish-rate throttling.
//!
//! Raw predictions arrive at the sensor sample rate, far faster than
//! observers need. Each prediction stream (coarse, fine-grained solo,
//! fused) owns its own throttle clock so publishes on one stream never
//! delay another.

/// Minimum spacing between published predictions on one stream (ms).
pub const PRED_INTERVAL_MS: u64 = 1000;

/// A per-stream publish clock.
///
/// The clock starts at construction time, so the first publish happens
/// only after a full interval has elapsed.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: u64,
    last_fire_ms: u64,
}

impl Throttle {
    /// Creates a throttle whose clock starts at `now_ms`.
    pub fn new(interval_ms: u64, now_ms: u64) -> Self {
        Self {
            interval_ms,
            last_fire_ms: now_ms,
        }
    }

    /// Returns true and resets the clock when more than the interval has
    /// passed since the last fire; otherwise the caller drops the update.
    pub fn ready(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_fire_ms) > self.interval_ms {
            self.last_fire_ms = now_ms;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fire_waits_a_full_interval() {
        let mut throttle = Throttle::new(1000, 0);
        assert!(!throttle.ready(0));
        assert!(!throttle.ready(1000)); // boundary is exclusive
        assert!(throttle.ready(1001));
    }

    #[test]
    fn test_burst_yields_at_most_one_publish() {
        let mut throttle = Throttle::new(1000, 0);
        let fired = (0..100).filter(|i| throttle.ready(1001 + i * 5)).count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_fires_once_per_interval() {
        let mut throttle = Throttle::new(1000, 0);
        let mut fired = 0;
        for now in (0..10_000).step_by(50) {
            if throttle.ready(now) {
                fired += 1;
            }
        }
        // One fire per elapsed interval, minus the initial warmup.
        assert_eq!(fired, 9);
    }

    #[test]
    fn test_streams_do_not_contend() {
        let mut coarse = Throttle::new(1000, 0);
        let mut fused = Throttle::new(1000, 0);

        // A burst on the coarse stream consumes only its own clock.
        let coarse_fired = (0..100).filter(|i| coarse.ready(1001 + i)).count();
        assert_eq!(coarse_fired, 1);
        assert!(fused.ready(1001));
    }

    #[test]
    fn test_clock_moves_backward_is_tolerated() {
        let mut throttle = Throttle::new(1000, 5000);
        // A stale timestamp must not underflow or fire.
        assert!(!throttle.ready(100));
    }
}
