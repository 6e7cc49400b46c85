//! Run state
//!
//! Counters and timers that live for one process run. Nothing here is
//! persisted.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::driver::ScreenSize;

/// State of the browsing loop
#[derive(Debug, Clone)]
pub struct RunState {
    /// Measured window size
    pub screen: ScreenSize,
    /// Day of month the last check-in decision was made on
    pub current_day: Option<u32>,
    /// Start of the current reward box interval
    pub last_reward_claim: Option<Instant>,
    /// Running totals
    pub stats: RunStats,
}

/// Totals reported at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub videos_watched: u64,
    pub likes: u64,
    pub rewards_claimed: u64,
    pub check_ins: u64,
    pub restarts: u32,
}

impl RunState {
    /// Create a new run state
    pub fn new() -> Self {
        Self {
            screen: ScreenSize::default(),
            current_day: None,
            last_reward_claim: None,
            stats: RunStats::default(),
        }
    }

    /// Whether `today` differs from the recorded day.
    ///
    /// With no day recorded yet there is nothing to compare against.
    pub fn day_changed(&self, today: u32) -> bool {
        self.current_day.is_some_and(|day| day != today)
    }

    /// Remember `today` as handled
    pub fn record_day(&mut self, today: u32) {
        self.current_day = Some(today);
    }

    /// Start the reward timer if it is not running yet
    pub fn start_reward_timer(&mut self, now: Instant) {
        self.last_reward_claim.get_or_insert(now);
    }

    /// Time since the last reward claim
    pub fn since_reward(&self, now: Instant) -> Duration {
        self.last_reward_claim
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default()
    }

    /// Whether the reward box is due
    pub fn reward_due(&self, now: Instant, interval: Duration) -> bool {
        self.last_reward_claim.is_some() && self.since_reward(now) >= interval
    }

    /// Begin a new reward interval
    pub fn restart_reward_timer(&mut self, now: Instant) {
        self.last_reward_claim = Some(now);
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
