//! Monotonic millisecond clock used by every bounded wait.
use embassy_time::{Duration, Instant};

/// Millisecond clock plus a blocking delay.
pub trait Clock {
    /// Milliseconds since an arbitrary fixed point; never decreases.
    fn now_ms(&self) -> u64;

    /// Block the caller for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u64);
}

/// [`Clock`] on top of the embassy time driver.
#[derive(Clone, Copy, Debug)]
pub struct EmbassyClock {
    anchor: Instant,
}

impl EmbassyClock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Default for EmbassyClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now()
            .checked_duration_since(self.anchor)
            .unwrap_or_else(|| Duration::from_millis(0))
            .as_millis()
    }

    fn delay_ms(&mut self, ms: u64) {
        embassy_time::block_for(Duration::from_millis(ms));
    }
}

/// Point in time after which a bounded wait gives up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    at_ms: u64,
}

impl Deadline {
    pub fn after<C: Clock + ?Sized>(clock: &C, window_ms: u64) -> Self {
        Self {
            at_ms: clock.now_ms().saturating_add(window_ms),
        }
    }

    pub fn expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        clock.now_ms() >= self.at_ms
    }

    pub fn remaining_ms<C: Clock + ?Sized>(&self, clock: &C) -> u64 {
        self.at_ms.saturating_sub(clock.now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embassy_clock_is_monotonic() {
        let mut clock = EmbassyClock::new();
        let before = clock.now_ms();
        clock.delay_ms(2);
        let after = clock.now_ms();
        assert!(after >= before + 2);
    }

    #[test]
    fn deadline_expires_after_window() {
        let mut clock = crate::testing::MockClock::new();
        let deadline = Deadline::after(&clock, 100);
        assert!(!deadline.expired(&clock));
        assert_eq!(deadline.remaining_ms(&clock), 100);

        clock.delay_ms(99);
        assert!(!deadline.expired(&clock));
        clock.delay_ms(1);
        assert!(deadline.expired(&clock));
        assert_eq!(deadline.remaining_ms(&clock), 0);
    }
}
