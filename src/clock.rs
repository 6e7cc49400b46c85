//! Time source for the autopilot
//!
//! Every blocking wait and every "what day is it" question goes through
//! [`Clock`] so the browsing loop can be driven without real sleeps.

use std::time::{Duration, Instant};

use chrono::{Datelike, Local};

/// Monotonic time, calendar day and blocking sleep
pub trait Clock {
    /// Monotonic now
    fn now(&self) -> Instant;

    /// Local calendar day of month (1-31)
    fn today(&self) -> u32;

    /// Block the current thread
    fn sleep(&mut self, duration: Duration);
}

/// Real wall clock backed by `std::thread::sleep` and the local timezone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn today(&self) -> u32 {
        Local::now().day()
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Clock that only advances when slept on
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Duration,
    slept: Duration,
    start_day: u32,
}

#[cfg(test)]
impl ManualClock {
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new() -> Self {
        Self::starting_on(1)
    }

    pub fn starting_on(day: u32) -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Duration::ZERO,
            slept: Duration::ZERO,
            start_day: day,
        }
    }

    /// Jump forward without counting it as sleep
    pub fn advance(&mut self, by: Duration) {
        self.elapsed += by;
    }

    /// Total time spent in `sleep`
    pub fn slept(&self) -> Duration {
        self.slept
    }
}

#[cfg(test)]
impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed
    }

    fn today(&self) -> u32 {
        let days = (self.elapsed.as_secs() / Self::DAY.as_secs()) as u32;
        (self.start_day - 1 + days) % 31 + 1
    }

    fn sleep(&mut self, duration: Duration) {
        self.elapsed += duration;
        self.slept += duration;
    }
}
