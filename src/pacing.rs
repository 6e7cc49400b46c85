//! Viewing rhythm
//!
//! Decides how long each video is watched and which ones get a like.

use std::ops::RangeInclusive;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::settings::TimingSettings;

/// Random source for per-video decisions
pub struct Pacer {
    rng: StdRng,
    /// Watch time range in seconds
    watch_secs: RangeInclusive<u64>,
    /// One video in `like_odds` gets a like
    like_odds: u32,
}

impl Pacer {
    /// Create a pacer seeded from the OS
    pub fn new(timings: &TimingSettings) -> Self {
        Self::with_rng(timings, StdRng::from_entropy())
    }

    /// Create a reproducible pacer
    pub fn seeded(timings: &TimingSettings, seed: u64) -> Self {
        Self::with_rng(timings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(timings: &TimingSettings, rng: StdRng) -> Self {
        let min = timings.watch_min_secs.min(timings.watch_max_secs);
        Self {
            rng,
            watch_secs: min..=timings.watch_max_secs,
            like_odds: timings.like_odds.max(1),
        }
    }

    /// How long to stay on the current video
    pub fn watch_duration(&mut self) -> Duration {
        Duration::from_secs(self.rng.gen_range(self.watch_secs.clone()))
    }

    /// Whether to like the current video
    pub fn should_like(&mut self) -> bool {
        self.rng.gen_range(1..=self.like_odds) == self.like_odds
    }
}
