//! Video Autopilot - Appium-driven browsing for an Android short-video app
//!
//! This library drives a UI-automation session to browse the feed the way a
//! person would: swipe to the next video, watch it for a while, now and then
//! leave a like, open the reward box whenever its timer is up and visit the
//! reward page once per calendar day for the check-in.
//!
//! ## Failure handling
//!
//! A control that is not on screen is routine and only logged. Any other
//! driver failure ends the current pass; [`Autopilot::run`] then waits out a
//! fixed backoff, opens a new session if the old one was lost, and starts a
//! new pass that relaunches the app. The number of restarts is bounded.

pub mod app;
pub mod clock;
pub mod config;
pub mod driver;
pub mod pacing;
pub mod state;

use std::time::Duration;

use crate::app::{AppTasks, LoginError, LoginFlow, Prompt};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, Settings};
use crate::driver::{Driver, DriverError};
use crate::pacing::Pacer;
use crate::state::{RunState, RunStats};

/// The browsing loop and everything it owns
pub struct Autopilot<D, C = SystemClock> {
    driver: D,
    clock: C,
    pub settings: Settings,
    pub state: RunState,
    pacer: Pacer,
}

/// What one iteration of the loop did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub checked_in: bool,
    pub reward_claimed: bool,
    pub liked: bool,
    pub watched: Duration,
}

impl<D: Driver, C: Clock> Autopilot<D, C> {
    /// Create a new autopilot with the given settings
    pub fn new(driver: D, clock: C, settings: Settings) -> Self {
        let pacer = Pacer::new(&settings.timings);
        Self {
            driver,
            clock,
            settings,
            state: RunState::new(),
            pacer,
        }
    }

    /// Replace the random source
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    fn tasks(&mut self) -> AppTasks<'_, D, C> {
        AppTasks::new(
            &mut self.driver,
            &mut self.clock,
            &self.settings.locators,
            &self.settings.timings,
        )
    }

    /// Log in with a phone number and SMS code
    pub fn login<P: Prompt + ?Sized>(&mut self, prompt: &mut P) -> Result<(), LoginError> {
        LoginFlow::new(
            &mut self.driver,
            &mut self.clock,
            &self.settings.locators.login,
            &self.settings.timings,
        )
        .run(prompt)
    }

    /// Measure the screen and bring the app up fresh
    pub fn prepare(&mut self) -> Result<(), DriverError> {
        let today = *self.state.current_day.get_or_insert(self.clock.today());
        log::info!("Today is day {} of the month", today);

        let screen = self.driver.window_size()?;
        log::info!("Screen is {}x{}", screen.width, screen.height);
        self.state.screen = screen;

        self.driver.close_app()?;
        self.driver.launch_app()?;
        self.tasks().dismiss_notices()?;

        self.state.start_reward_timer(self.clock.now());
        Ok(())
    }

    /// One loop iteration: check-in, reward box, next video
    pub fn step(&mut self) -> Result<StepReport, DriverError> {
        let mut report = StepReport::default();

        let today = self.clock.today();
        if self.state.day_changed(today) {
            log::info!("Day changed to {}, checking in", today);
            report.checked_in = self.tasks().check_in()?;
            // only a check-in that ran to completion closes out the day
            self.state.record_day(today);
            if report.checked_in {
                self.state.stats.check_ins += 1;
                log::info!("Check-in done");
            }
        } else if self.state.current_day.is_none() {
            self.state.record_day(today);
        }

        let now = self.clock.now();
        let interval = self.settings.timings.reward_interval();
        log::debug!(
            "{}s since last reward box",
            self.state.since_reward(now).as_secs()
        );
        if self.state.reward_due(now, interval) {
            log::info!("Reward box is due, claiming");
            report.reward_claimed = self.tasks().claim_reward()?;
            if report.reward_claimed {
                self.state.stats.rewards_claimed += 1;
                log::info!("Reward box claimed");
            }
            self.state.restart_reward_timer(self.clock.now());
        }

        let screen = self.state.screen;
        self.tasks().next_video(screen)?;
        log::debug!("Swiped to next video");

        report.watched = self.pacer.watch_duration();
        if self.pacer.should_like() {
            report.liked = self.tasks().like()?;
            if report.liked {
                self.state.stats.likes += 1;
                log::info!("Liked a video");
            }
        }

        self.clock.sleep(report.watched);
        self.state.stats.videos_watched += 1;
        log::debug!("Watched for {}s", report.watched.as_secs());

        Ok(report)
    }

    /// Prepare, then step until the video limit (if any) is reached
    pub fn run_pass(&mut self) -> Result<(), DriverError> {
        self.prepare()?;
        let max_videos = self.settings.limits.max_videos;
        loop {
            self.step()?;
            if max_videos > 0 && self.state.stats.videos_watched >= max_videos {
                log::info!("Watched {} videos, stopping", self.state.stats.videos_watched);
                return Ok(());
            }
        }
    }

    /// Run passes until done, restarting the app after driver failures
    pub fn run(&mut self) -> Result<RunStats, AutopilotError> {
        let max_restarts = self.settings.limits.max_restarts;
        let backoff = self.settings.timings.restart_backoff();

        loop {
            let error = match self.run_pass() {
                Ok(()) => return Ok(self.state.stats.clone()),
                Err(e) => e,
            };

            let restarts = self.state.stats.restarts;
            if max_restarts > 0 && restarts >= max_restarts {
                log::error!("Driver failure after {} restarts, giving up: {}", restarts, error);
                return Err(AutopilotError::RestartsExhausted {
                    restarts,
                    last_error: error,
                });
            }

            log::error!(
                "Driver failure: {}; relaunching app in {}s",
                error,
                backoff.as_secs()
            );
            self.clock.sleep(backoff);
            self.state.stats.restarts += 1;

            if error.session_lost() {
                // the server drops idle sessions, so the old one is likely gone
                if let Err(e) = self.driver.reconnect() {
                    log::error!("Could not open a new session: {}", e);
                }
            }
        }
    }
}

/// Top-level errors
#[derive(Debug, thiserror::Error)]
pub enum AutopilotError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error("Gave up after {restarts} restarts, last error: {last_error}")]
    RestartsExhausted {
        restarts: u32,
        last_error: DriverError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::driver::scripted::{Call, ScriptedDriver};
    use crate::driver::ScreenSize;

    const NEVER: u32 = u32::MAX;

    fn quiet_settings() -> Settings {
        let mut settings = Settings::default();
        settings.timings.notice_attempts = 0;
        settings.timings.watch_min_secs = 10;
        settings.timings.watch_max_secs = 10;
        settings.timings.like_odds = NEVER;
        settings.timings.reward_interval_secs = 1_000_000_000;
        settings
    }

    fn autopilot(
        driver: ScriptedDriver,
        clock: ManualClock,
        settings: Settings,
    ) -> Autopilot<ScriptedDriver, ManualClock> {
        let pacer = Pacer::seeded(&settings.timings, 5);
        Autopilot::new(driver, clock, settings).with_pacer(pacer)
    }

    #[test]
    fn test_prepare_measures_and_relaunches() {
        let driver = ScriptedDriver::new().with_screen(ScreenSize::new(720, 1600));
        let mut pilot = autopilot(driver, ManualClock::starting_on(9), quiet_settings());

        pilot.prepare().unwrap();

        assert_eq!(pilot.state.screen, ScreenSize::new(720, 1600));
        assert_eq!(pilot.state.current_day, Some(9));
        assert!(pilot.state.last_reward_claim.is_some());
        assert_eq!(
            pilot.driver.calls,
            vec![Call::WindowSize, Call::CloseApp, Call::LaunchApp]
        );
    }

    #[test]
    fn test_run_stops_at_video_limit() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 3;
        settings.timings.like_odds = 1;
        let mut driver = ScriptedDriver::new();
        driver.show(&settings.locators.like_button);
        let mut pilot = autopilot(driver, ManualClock::new(), settings);

        let stats = pilot.run().unwrap();

        assert_eq!(stats.videos_watched, 3);
        assert_eq!(stats.likes, 3);
        assert_eq!(stats.restarts, 0);
        assert_eq!(pilot.driver.swipes(), 3);
        assert_eq!(pilot.clock.slept(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_like_button_does_not_stop_loop() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 2;
        settings.timings.like_odds = 1;
        let mut pilot = autopilot(ScriptedDriver::new(), ManualClock::new(), settings);

        let stats = pilot.run().unwrap();

        assert_eq!(stats.videos_watched, 2);
        assert_eq!(stats.likes, 0);
    }

    #[test]
    fn test_reward_box_claimed_on_interval() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 5;
        settings.timings.reward_interval_secs = 30;
        let mut driver = ScriptedDriver::new();
        driver.show(&settings.locators.rewards_entrance);
        driver.show(&settings.locators.reward_box);
        driver.show(&settings.locators.rewards_exit);
        let mut pilot = autopilot(driver, ManualClock::new(), settings);

        let stats = pilot.run().unwrap();

        // steps start at t = 0, 10, 20, 30, 40; only t = 30 is due
        assert_eq!(stats.rewards_claimed, 1);
        let reward_box = pilot.settings.locators.reward_box.clone();
        assert_eq!(pilot.driver.count(&Call::Click(reward_box)), 1);
    }

    #[test]
    fn test_failed_claim_still_restarts_timer() {
        let mut settings = quiet_settings();
        settings.timings.reward_interval_secs = 10;
        let mut driver = ScriptedDriver::new();
        driver.show(&settings.locators.rewards_entrance);
        driver.show(&settings.locators.rewards_exit);
        let mut pilot = autopilot(driver, ManualClock::new(), settings);
        pilot.prepare().unwrap();

        pilot.step().unwrap();
        let report = pilot.step().unwrap();

        assert!(!report.reward_claimed);
        assert_eq!(pilot.state.stats.rewards_claimed, 0);
        let now = pilot.clock.now();
        assert_eq!(pilot.state.since_reward(now), Duration::from_secs(10));
    }

    #[test]
    fn test_check_in_once_per_day() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 4;
        settings.timings.watch_min_secs = 12 * 60 * 60;
        settings.timings.watch_max_secs = 12 * 60 * 60;
        let mut driver = ScriptedDriver::new();
        driver.show(&settings.locators.rewards_entrance);
        driver.show(&settings.locators.rewards_exit);
        let mut pilot = autopilot(driver, ManualClock::starting_on(1), settings);

        let stats = pilot.run().unwrap();

        // days seen per step: 1, 1, 2, 2
        assert_eq!(stats.check_ins, 1);
        assert_eq!(pilot.state.current_day, Some(2));
    }

    #[test]
    fn test_restart_after_driver_failure() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 2;
        let mut driver = ScriptedDriver::new();
        // window size, close, launch, then the first swipe fails
        driver.fail_after(3);
        let mut pilot = autopilot(driver, ManualClock::new(), settings);

        let stats = pilot.run().unwrap();

        assert_eq!(stats.restarts, 1);
        assert_eq!(stats.videos_watched, 2);
        assert_eq!(pilot.driver.count(&Call::CloseApp), 2);
        assert_eq!(pilot.driver.count(&Call::LaunchApp), 2);
        assert_eq!(pilot.clock.slept(), Duration::from_secs(1000 + 20));
    }

    #[test]
    fn test_check_in_retried_after_failure() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 3;
        settings.timings.watch_min_secs = 12 * 60 * 60;
        settings.timings.watch_max_secs = 12 * 60 * 60;
        let mut driver = ScriptedDriver::new();
        driver.show(&settings.locators.rewards_entrance);
        driver.show(&settings.locators.rewards_exit);
        // window size, close, launch, two swipes, then the check-in lookup fails
        driver.fail_after(5);
        let mut pilot = autopilot(driver, ManualClock::starting_on(1), settings);

        let stats = pilot.run().unwrap();

        assert_eq!(stats.restarts, 1);
        assert_eq!(stats.check_ins, 1);
        assert_eq!(stats.videos_watched, 3);
        assert_eq!(pilot.state.current_day, Some(2));
    }

    #[test]
    fn test_expired_session_is_replaced() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 2;
        let mut driver = ScriptedDriver::new();
        // expires right at the first swipe
        driver.expire_session_after(3);
        let mut pilot = autopilot(driver, ManualClock::new(), settings);

        let stats = pilot.run().unwrap();

        assert_eq!(stats.restarts, 1);
        assert_eq!(stats.videos_watched, 2);
        assert_eq!(pilot.driver.count(&Call::Reconnect), 1);
        assert!(matches!(pilot.driver.calls[3], Call::Swipe(..)));
        assert_eq!(pilot.driver.calls[4], Call::Reconnect);
        assert_eq!(pilot.driver.calls[5], Call::WindowSize);
    }

    #[test]
    fn test_reward_timer_survives_restart() {
        let mut settings = quiet_settings();
        settings.limits.max_videos = 1;
        settings.timings.restart_backoff_secs = 100;
        let mut driver = ScriptedDriver::new();
        driver.fail_after(3);
        let mut pilot = autopilot(driver, ManualClock::new(), settings);

        pilot.run().unwrap();

        let now = pilot.clock.now();
        assert_eq!(pilot.state.since_reward(now), Duration::from_secs(110));
    }

    #[test]
    fn test_gives_up_after_max_restarts() {
        let mut settings = quiet_settings();
        settings.limits.max_restarts = 2;
        let mut driver = ScriptedDriver::new();
        driver.fail_always();
        let mut pilot = autopilot(driver, ManualClock::new(), settings);

        let err = pilot.run().unwrap_err();

        match err {
            AutopilotError::RestartsExhausted { restarts, last_error } => {
                assert_eq!(restarts, 2);
                assert!(matches!(last_error, DriverError::Transport(_)));
            }
            other => panic!("Expected RestartsExhausted, got {:?}", other),
        }
        assert_eq!(pilot.clock.slept(), Duration::from_secs(2000));
        assert_eq!(pilot.driver.count(&Call::WindowSize), 3);
    }

    #[test]
    fn test_login_uses_login_locators() {
        let settings = quiet_settings();
        let mut pilot = autopilot(ScriptedDriver::new(), ManualClock::new(), settings);

        struct NoInput;
        impl Prompt for NoInput {
            fn ask(&mut self, _message: &str) -> std::io::Result<String> {
                Ok(String::new())
            }
        }

        let err = pilot.login(&mut NoInput).unwrap_err();
        assert!(matches!(err, LoginError::Driver(DriverError::NoSuchElement(_))));

        let red_packet = pilot.settings.locators.login.red_packet.clone();
        assert_eq!(pilot.driver.calls, vec![Call::Find(red_packet)]);
    }
}
