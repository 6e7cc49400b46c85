//! In-app tasks
//!
//! Each task is a short sequence of driver calls. A control that is not on
//! screen is routine: it is logged and the task reports `false`. Any other
//! driver failure is returned to the caller.

use std::time::Duration;

use crate::clock::Clock;
use crate::config::settings::{Locators, TimingSettings};
use crate::driver::gesture::GestureGenerator;
use crate::driver::{wait_and_click, Driver, DriverError, Locator, ScreenSize};

/// Task runner bound to one driver and clock
pub struct AppTasks<'a, D: ?Sized, C: ?Sized> {
    driver: &'a mut D,
    clock: &'a mut C,
    locators: &'a Locators,
    timings: &'a TimingSettings,
}

impl<'a, D, C> AppTasks<'a, D, C>
where
    D: Driver + ?Sized,
    C: Clock + ?Sized,
{
    /// Create a task runner
    pub fn new(
        driver: &'a mut D,
        clock: &'a mut C,
        locators: &'a Locators,
        timings: &'a TimingSettings,
    ) -> Self {
        Self {
            driver,
            clock,
            locators,
            timings,
        }
    }

    /// Dismiss "got it" notices that pop up over the feed.
    ///
    /// Returns how many were dismissed.
    pub fn dismiss_notices(&mut self) -> Result<u32, DriverError> {
        let locators = self.locators;
        let mut dismissed = 0;
        for _ in 0..self.timings.notice_attempts {
            let result = self.click_when_ready(&locators.notice_ok, self.timings.notice_wait());
            if tolerate_missing("notice", result)? {
                dismissed += 1;
            }
        }
        if dismissed > 0 {
            log::info!("Dismissed {} notice(s)", dismissed);
        }
        Ok(dismissed)
    }

    /// Tap the heart on the current video
    pub fn like(&mut self) -> Result<bool, DriverError> {
        let result = match self.driver.find_element(&self.locators.like_button) {
            Ok(element) => self.driver.click(&element),
            Err(e) => Err(e),
        };
        tolerate_missing("like button", result)
    }

    /// Swipe to the next video
    pub fn next_video(&mut self, screen: ScreenSize) -> Result<(), DriverError> {
        self.gestures(screen).next_video().perform(&mut *self.driver)
    }

    /// Swipe back to the previous video
    pub fn previous_video(&mut self, screen: ScreenSize) -> Result<(), DriverError> {
        self.gestures(screen).previous_video().perform(&mut *self.driver)
    }

    /// Open the reward page
    pub fn open_rewards(&mut self) -> Result<bool, DriverError> {
        let locators = self.locators;
        let result =
            self.click_when_ready(&locators.rewards_entrance, self.timings.rewards_entrance_wait());
        tolerate_missing("reward page entrance", result)
    }

    /// Open the treasure box on the reward page
    pub fn claim_reward_box(&mut self) -> Result<bool, DriverError> {
        let locators = self.locators;
        let result = self.click_when_ready(&locators.reward_box, self.timings.reward_box_wait());
        tolerate_missing("reward box", result)
    }

    /// Leave the reward page and return to the feed
    pub fn leave_rewards(&mut self) -> Result<bool, DriverError> {
        let locators = self.locators;
        let result = self.click_when_ready(&locators.rewards_exit, self.timings.long_wait());
        tolerate_missing("reward page exit", result)
    }

    /// Daily check-in: visiting the reward page triggers it
    pub fn check_in(&mut self) -> Result<bool, DriverError> {
        let opened = self.open_rewards()?;
        let left = self.leave_rewards()?;
        Ok(opened && left)
    }

    /// Open the reward page, claim the box and come back
    pub fn claim_reward(&mut self) -> Result<bool, DriverError> {
        let opened = self.open_rewards()?;
        let claimed = self.claim_reward_box()?;
        self.leave_rewards()?;
        Ok(opened && claimed)
    }

    fn click_when_ready(&mut self, locator: &Locator, timeout: Duration) -> Result<(), DriverError> {
        let poll = self.timings.poll();
        wait_and_click(&mut *self.driver, &mut *self.clock, locator, timeout, poll)
    }

    fn gestures(&self, screen: ScreenSize) -> GestureGenerator {
        GestureGenerator::new(screen).with_swipe_duration(self.timings.swipe_duration())
    }
}

/// Turn "element not on screen" into `Ok(false)`
fn tolerate_missing(what: &str, result: Result<(), DriverError>) -> Result<bool, DriverError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_element_missing() => {
            log::warn!("No {} found: {}", what, e);
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
