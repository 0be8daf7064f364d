//! services/discussion_client/src/socket/backoff.rs
//!
//! Reconnection delay policy: doubling from the initial delay, capped, with
//! symmetric random jitter.

use discussion_core::ports::ConnectOptions;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    jitter: f64,
    attempts: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            min,
            max: max.max(min),
            jitter: jitter.clamp(0.0, 1.0),
            attempts: 0,
        }
    }

    pub fn from_options(options: &ConnectOptions) -> Self {
        Self::new(
            options.reconnection_delay,
            options.reconnection_delay_max,
            options.randomization_factor,
        )
    }

    /// Number of delays handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn next_delay(&mut self) -> Duration {
        let roll = rand::rng().random::<f64>();
        let delay = self.delay_for(self.attempts, roll);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// `roll` is a uniform sample in `[0, 1)`; its parity digit picks the
    /// jitter direction.
    fn delay_for(&self, attempt: u32, roll: f64) -> Duration {
        let min_ms = self.min.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;
        let mut ms = min_ms * 2f64.powi(attempt.min(31) as i32);
        if self.jitter > 0.0 {
            let deviation = (roll * self.jitter * ms).floor();
            if ((roll * 10.0).floor() as u64) & 1 == 0 {
                ms -= deviation;
            } else {
                ms += deviation;
            }
        }
        Duration::from_millis(ms.min(max_ms).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_caps_without_jitter() {
        let mut backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(5000), 0.0);
        let delays: Vec<u64> = (0..5).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
        assert_eq!(backoff.attempts(), 5);
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
    }

    #[test]
    fn jitter_direction_follows_roll() {
        let backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(5000), 0.5);
        // floor(0.25 * 10) = 2 is even: delay shrinks by floor(0.25 * 0.5 * 1000).
        assert_eq!(backoff.delay_for(0, 0.25), Duration::from_millis(875));
        // floor(0.3125 * 10) = 3 is odd: delay grows.
        assert_eq!(backoff.delay_for(0, 0.3125), Duration::from_millis(1156));
        // Growth never passes the cap.
        assert_eq!(backoff.delay_for(2, 0.95), Duration::from_millis(5000));
    }

    #[test]
    fn random_delays_stay_in_bounds() {
        let options = ConnectOptions::default();
        let mut backoff = Backoff::from_options(&options);
        for _ in 0..50 {
            let delay = backoff.next_delay();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= options.reconnection_delay_max);
        }
    }

    #[test]
    fn huge_attempt_counts_do_not_overflow() {
        let backoff = Backoff::new(Duration::from_millis(1000), Duration::from_millis(5000), 0.0);
        assert_eq!(backoff.delay_for(u32::MAX, 0.0), Duration::from_millis(5000));
    }
}
