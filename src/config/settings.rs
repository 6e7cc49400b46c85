//! User settings
//!
//! Defines all configurable options for the autopilot: where the driver
//! lives, which app to drive, how to find its controls and how to pace
//! the browsing loop.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::driver::Locator;

/// Package of the app driven by default
pub const DEFAULT_APP_PACKAGE: &str = "com.ss.android.ugc.aweme.lite";

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Appium server endpoint
    pub server_url: String,
    /// Session capabilities
    pub capabilities: Capabilities,
    /// Where to find the app's controls
    pub locators: Locators,
    /// Loop pacing and wait budgets
    pub timings: TimingSettings,
    /// Restart and run-length limits
    pub limits: LimitSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:4723/wd/hub".to_string(),
            capabilities: Capabilities::default(),
            locators: Locators::default(),
            timings: TimingSettings::default(),
            limits: LimitSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Pretty JSON, suitable for writing back as a config file
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server_url is empty".to_string()));
        }
        if self.capabilities.app_package.trim().is_empty() {
            return Err(ConfigError::Invalid("app_package is empty".to_string()));
        }

        let t = &self.timings;
        if t.watch_min_secs > t.watch_max_secs {
            return Err(ConfigError::Invalid(format!(
                "watch range {}..={} is empty",
                t.watch_min_secs, t.watch_max_secs
            )));
        }
        if t.like_odds == 0 {
            return Err(ConfigError::Invalid("like_odds must be at least 1".to_string()));
        }
        if t.poll_ms == 0 {
            return Err(ConfigError::Invalid("poll_ms must be positive".to_string()));
        }

        Ok(())
    }
}

/// Appium session capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    pub platform_name: String,
    /// Device model as reported by adb
    pub device_name: String,
    pub app_package: String,
    pub app_activity: String,
    /// Keep app data (and the logged-in account) between sessions
    pub no_reset: bool,
    /// e.g. `UiAutomator2`; left to the server when unset
    pub automation_name: Option<String>,
    /// Idle time before the server drops the session (s); must outlast the restart backoff
    pub new_command_timeout_secs: u64,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            platform_name: "Android".to_string(),
            device_name: "VIE_AL10".to_string(),
            app_package: DEFAULT_APP_PACKAGE.to_string(),
            app_activity: "com.ss.android.ugc.aweme.main.MainActivity".to_string(),
            no_reset: true,
            automation_name: None,
            new_command_timeout_secs: 1800,
        }
    }
}

fn app_id(suffix: &str) -> Locator {
    Locator::id(format!("{}:id/{}", DEFAULT_APP_PACKAGE, suffix))
}

/// Locators for the controls the autopilot touches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Locators {
    /// Heart button on the video page
    pub like_button: Locator,
    /// Tab that opens the coin/reward page
    pub rewards_entrance: Locator,
    /// Timed treasure box on the reward page
    pub reward_box: Locator,
    /// Back control on the reward page
    pub rewards_exit: Locator,
    /// "Got it" button on system and in-app notices
    pub notice_ok: Locator,
    /// Controls of the phone-number login flow
    pub login: LoginLocators,
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            like_button: app_id("a4m"),
            rewards_entrance: Locator::xpath(
                "/hierarchy/android.widget.FrameLayout/android.widget.LinearLayout\
                 /android.widget.FrameLayout/android.widget.FrameLayout\
                 /android.widget.HorizontalScrollView/android.widget.LinearLayout\
                 /android.widget.TabHost/android.widget.FrameLayout\
                 /android.widget.FrameLayout[2]/android.widget.LinearLayout\
                 /android.widget.FrameLayout[3]",
            ),
            reward_box: Locator::xpath("//android.widget.Image[@content-desc=\"开宝箱得金币\"]"),
            rewards_exit: app_id("yt"),
            notice_ok: Locator::xpath("//*[@text='我知道了']"),
            login: LoginLocators::default(),
        }
    }
}

/// Login flow controls, in the order they are used
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginLocators {
    pub red_packet: Locator,
    pub earn_more: Locator,
    pub agree_terms: Locator,
    /// "Log in with another phone number"
    pub other_number: Locator,
    pub confirm_number: Locator,
    pub request_code: Locator,
    pub code_input: Locator,
    pub submit: Locator,
    pub earn_more_after_login: Locator,
    pub skip_guide: Locator,
}

impl Default for LoginLocators {
    fn default() -> Self {
        Self {
            red_packet: app_id("ahp"),
            earn_more: app_id("agv"),
            agree_terms: app_id("ae0"),
            other_number: Locator::xpath(
                "/hierarchy/android.widget.FrameLayout/android.widget.LinearLayout\
                 /android.widget.FrameLayout/android.widget.LinearLayout[1]\
                 /android.widget.FrameLayout/android.view.ViewGroup\
                 /android.widget.LinearLayout[2]/android.widget.LinearLayout",
            ),
            confirm_number: app_id("a9l"),
            request_code: app_id("ae0"),
            code_input: app_id("ae9"),
            submit: app_id("a9l"),
            earn_more_after_login: app_id("agu"),
            skip_guide: app_id("a3y"),
        }
    }
}

/// Timing settings for the browsing loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Seconds between reward box claims
    pub reward_interval_secs: u64,
    /// Shortest time spent on one video (s)
    pub watch_min_secs: u64,
    /// Longest time spent on one video (s)
    pub watch_max_secs: u64,
    /// One video in this many gets a like
    pub like_odds: u32,
    /// Duration of the feed swipe (ms)
    pub swipe_ms: u64,
    /// Pause before relaunching the app after a driver failure (s)
    pub restart_backoff_secs: u64,
    /// Default polling interval for element waits (ms)
    pub poll_ms: u64,
    /// Wait budget per notice dismissal attempt (ms)
    pub notice_wait_ms: u64,
    /// Notice dismissal attempts at startup
    pub notice_attempts: u32,
    /// Wait budget for the reward tab (s)
    pub rewards_entrance_wait_secs: u64,
    /// Wait budget for the reward box (s)
    pub reward_box_wait_secs: u64,
    /// Wait budget for slow transitions such as leaving the reward page (s)
    pub long_wait_secs: u64,
    /// Pause for the first login screen to settle (ms)
    pub login_settle_ms: u64,
    /// TCP connect timeout for driver requests (s)
    pub connect_timeout_secs: u64,
    /// HTTP read timeout for driver requests (s)
    pub request_timeout_secs: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            reward_interval_secs: 3600,
            watch_min_secs: 8,
            watch_max_secs: 15,
            like_odds: 9,
            swipe_ms: 500,
            restart_backoff_secs: 1000,
            poll_ms: 500,
            notice_wait_ms: 1000,
            notice_attempts: 5,
            rewards_entrance_wait_secs: 1,
            reward_box_wait_secs: 20,
            long_wait_secs: 300,
            login_settle_ms: 1000,
            connect_timeout_secs: 10,
            request_timeout_secs: 360,
        }
    }
}

impl TimingSettings {
    pub fn reward_interval(&self) -> Duration {
        Duration::from_secs(self.reward_interval_secs)
    }

    pub fn swipe_duration(&self) -> Duration {
        Duration::from_millis(self.swipe_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_secs(self.restart_backoff_secs)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    pub fn notice_wait(&self) -> Duration {
        Duration::from_millis(self.notice_wait_ms)
    }

    pub fn rewards_entrance_wait(&self) -> Duration {
        Duration::from_secs(self.rewards_entrance_wait_secs)
    }

    pub fn reward_box_wait(&self) -> Duration {
        Duration::from_secs(self.reward_box_wait_secs)
    }

    pub fn long_wait(&self) -> Duration {
        Duration::from_secs(self.long_wait_secs)
    }

    pub fn login_settle(&self) -> Duration {
        Duration::from_millis(self.login_settle_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Run-length limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// App relaunches allowed after driver failures (0 = unlimited)
    pub max_restarts: u32,
    /// Videos to watch before stopping (0 = unlimited)
    pub max_videos: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            max_restarts: 24,
            max_videos: 0,
        }
    }
}
