//! Automation driver module
//!
//! Defines the `Driver` seam the autopilot talks to, and the Appium
//! session that implements it over the WebDriver HTTP protocol.

pub mod gesture;
pub mod session;

#[cfg(test)]
pub(crate) mod scripted;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;

pub use gesture::{Point, ScreenSize};
pub use session::AppiumSession;

/// How an on-screen element is located
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// Android resource id, e.g. `com.example:id/button`
    Id(String),
    /// XPath over the UI hierarchy
    XPath(String),
}

impl Locator {
    /// Build an id locator
    pub fn id(value: impl Into<String>) -> Self {
        Locator::Id(value.into())
    }

    /// Build an xpath locator
    pub fn xpath(value: impl Into<String>) -> Self {
        Locator::XPath(value.into())
    }

    /// WebDriver strategy name
    pub fn strategy(&self) -> &'static str {
        match self {
            Locator::Id(_) => "id",
            Locator::XPath(_) => "xpath",
        }
    }

    /// Selector value passed along with the strategy
    pub fn value(&self) -> &str {
        match self {
            Locator::Id(v) | Locator::XPath(v) => v,
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// Opaque handle to an element found in the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementId(pub String);

/// Operations the autopilot needs from a UI-automation backend.
///
/// Every call blocks until the backend answers.
pub trait Driver {
    /// Locate a single element, failing with `NoSuchElement` if absent
    fn find_element(&mut self, locator: &Locator) -> Result<ElementId, DriverError>;

    /// Click a previously located element
    fn click(&mut self, element: &ElementId) -> Result<(), DriverError>;

    /// Type text into a previously located element
    fn send_keys(&mut self, element: &ElementId, text: &str) -> Result<(), DriverError>;

    /// Current window size in pixels
    fn window_size(&mut self) -> Result<ScreenSize, DriverError>;

    /// Single-finger swipe
    fn swipe(&mut self, from: Point, to: Point, duration: Duration) -> Result<(), DriverError>;

    /// Single-finger tap at a coordinate
    fn tap(&mut self, at: Point) -> Result<(), DriverError>;

    /// Press an Android key code
    fn press_keycode(&mut self, keycode: u32) -> Result<(), DriverError>;

    /// Force-stop the application under test
    fn close_app(&mut self) -> Result<(), DriverError>;

    /// Bring the application under test to the foreground
    fn launch_app(&mut self) -> Result<(), DriverError>;

    /// End the session
    fn quit(&mut self) -> Result<(), DriverError>;

    /// Replace the session with a fresh one
    fn reconnect(&mut self) -> Result<(), DriverError>;
}

/// Poll for an element until it shows up or the wait budget runs out
pub fn wait_for<D, C>(
    driver: &mut D,
    clock: &mut C,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<ElementId, DriverError>
where
    D: Driver + ?Sized,
    C: Clock + ?Sized,
{
    let started = clock.now();
    loop {
        match driver.find_element(locator) {
            Ok(element) => return Ok(element),
            Err(DriverError::NoSuchElement(_)) => {}
            Err(e) => return Err(e),
        }

        let waited = clock.now().saturating_duration_since(started);
        if waited >= timeout {
            return Err(DriverError::Timeout {
                locator: locator.to_string(),
                waited,
            });
        }
        clock.sleep(poll.min(timeout - waited));
    }
}

/// Wait for an element and click it
pub fn wait_and_click<D, C>(
    driver: &mut D,
    clock: &mut C,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<(), DriverError>
where
    D: Driver + ?Sized,
    C: Clock + ?Sized,
{
    let element = wait_for(driver, clock, locator, timeout, poll)?;
    driver.click(&element)
}

/// Driver errors
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Element not found: {0}")]
    NoSuchElement(String),
    #[error("Timed out after {waited:?} waiting for {locator}")]
    Timeout { locator: String, waited: Duration },
    #[error("No active session")]
    NoSession,
    #[error("Driver command failed ({code}): {message}")]
    Command { code: String, message: String },
    #[error("Driver transport error: {0}")]
    Transport(String),
    #[error("Unexpected driver response: {0}")]
    InvalidResponse(String),
}

impl DriverError {
    /// Whether this error only means the element was not on screen
    pub fn is_element_missing(&self) -> bool {
        matches!(
            self,
            DriverError::NoSuchElement(_) | DriverError::Timeout { .. }
        )
    }

    /// Whether the session itself is gone (expired, or the server went away)
    pub fn session_lost(&self) -> bool {
        matches!(self, DriverError::NoSession | DriverError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::scripted::ScriptedDriver;
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_locator_strategy() {
        assert_eq!(Locator::id("a:id/b").strategy(), "id");
        assert_eq!(Locator::xpath("//x").strategy(), "xpath");
        assert_eq!(Locator::id("a:id/b").to_string(), "id=a:id/b");
    }

    #[test]
    fn test_locator_serde_shape() {
        let json = serde_json::to_string(&Locator::id("pkg:id/a4m")).unwrap();
        assert_eq!(json, r#"{"id":"pkg:id/a4m"}"#);

        let parsed: Locator = serde_json::from_str(r#"{"xpath":"//a"}"#).unwrap();
        assert_eq!(parsed, Locator::xpath("//a"));
    }

    #[test]
    fn test_session_lost_classification() {
        assert!(DriverError::NoSession.session_lost());
        assert!(DriverError::Transport("reset".to_string()).session_lost());
        assert!(!DriverError::NoSuchElement("x".to_string()).session_lost());
        assert!(!DriverError::Command {
            code: "unknown error".to_string(),
            message: String::new(),
        }
        .session_lost());
    }

    #[test]
    fn test_wait_for_finds_late_element() {
        let mut driver = ScriptedDriver::new();
        let target = Locator::id("late");
        driver.appear_after(&target, 3);
        let mut clock = ManualClock::new();

        let found = wait_for(
            &mut driver,
            &mut clock,
            &target,
            Duration::from_secs(5),
            Duration::from_millis(500),
        );

        assert!(found.is_ok());
        assert_eq!(clock.slept(), Duration::from_millis(1500));
    }

    #[test]
    fn test_wait_for_times_out() {
        let mut driver = ScriptedDriver::new();
        let mut clock = ManualClock::new();

        let err = wait_for(
            &mut driver,
            &mut clock,
            &Locator::id("never"),
            Duration::from_secs(1),
            Duration::from_millis(400),
        )
        .unwrap_err();

        assert!(err.is_element_missing());
        assert_eq!(clock.slept(), Duration::from_secs(1));
    }

    #[test]
    fn test_wait_for_propagates_other_errors() {
        let mut driver = ScriptedDriver::new();
        driver.fail_after(0);
        let mut clock = ManualClock::new();

        let err = wait_for(
            &mut driver,
            &mut clock,
            &Locator::id("x"),
            Duration::from_secs(1),
            Duration::from_millis(500),
        )
        .unwrap_err();

        assert!(!err.is_element_missing());
    }
}
