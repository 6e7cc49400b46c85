//! In-memory driver for tests
//!
//! Elements are "on screen" when registered; every call is recorded so tests
//! can assert on the exact sequence the autopilot issued.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use super::{Driver, DriverError, ElementId, Locator, Point, ScreenSize};

/// One recorded driver call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Find(Locator),
    Click(Locator),
    SendKeys(Locator, String),
    WindowSize,
    Swipe(Point, Point, Duration),
    Tap(Point),
    Keycode(u32),
    CloseApp,
    LaunchApp,
    Quit,
    Reconnect,
}

pub struct ScriptedDriver {
    screen: ScreenSize,
    present: HashSet<Locator>,
    /// Lookups left to fail before the element shows up
    delayed: HashMap<Locator, usize>,
    elements: HashMap<String, Locator>,
    /// Call indices that fail with a transport error
    failures: Vec<usize>,
    always_fail: bool,
    /// Call index from which the session counts as expired
    expires_at: Option<usize>,
    pub calls: Vec<Call>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            screen: ScreenSize::new(1080, 2100),
            present: HashSet::new(),
            delayed: HashMap::new(),
            elements: HashMap::new(),
            failures: Vec::new(),
            always_fail: false,
            expires_at: None,
            calls: Vec::new(),
        }
    }

    pub fn with_screen(mut self, screen: ScreenSize) -> Self {
        self.screen = screen;
        self
    }

    /// Make an element findable
    pub fn show(&mut self, locator: &Locator) {
        self.present.insert(locator.clone());
    }

    /// Make an element findable after `misses` failed lookups
    pub fn appear_after(&mut self, locator: &Locator, misses: usize) {
        self.delayed.insert(locator.clone(), misses);
    }

    /// Fail the call that comes `n` calls from now
    pub fn fail_after(&mut self, n: usize) {
        self.failures.push(self.calls.len() + n);
    }

    /// Fail every call from now on
    pub fn fail_always(&mut self) {
        self.always_fail = true;
    }

    /// Expire the session `n` calls from now, until the next reconnect
    pub fn expire_session_after(&mut self, n: usize) {
        self.expires_at = Some(self.calls.len() + n);
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn clicks(&self) -> Vec<&Locator> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Click(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn swipes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Swipe(..)))
            .count()
    }

    fn record(&mut self, call: Call) -> Result<(), DriverError> {
        let index = self.calls.len();
        self.calls.push(call);
        if self.always_fail {
            return Err(DriverError::Transport("connection refused".to_string()));
        }
        if self.expires_at.is_some_and(|at| index >= at) {
            return Err(DriverError::NoSession);
        }
        if let Some(pos) = self.failures.iter().position(|&i| i == index) {
            self.failures.remove(pos);
            return Err(DriverError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    fn locator_of(&self, element: &ElementId) -> Result<Locator, DriverError> {
        self.elements
            .get(&element.0)
            .cloned()
            .ok_or_else(|| DriverError::InvalidResponse(format!("stale element {}", element.0)))
    }
}

impl Driver for ScriptedDriver {
    fn find_element(&mut self, locator: &Locator) -> Result<ElementId, DriverError> {
        self.record(Call::Find(locator.clone()))?;

        if let Some(misses) = self.delayed.get_mut(locator) {
            if *misses == 0 {
                self.delayed.remove(locator);
                self.present.insert(locator.clone());
            } else {
                *misses -= 1;
            }
        }

        if !self.present.contains(locator) {
            return Err(DriverError::NoSuchElement(locator.to_string()));
        }

        let id = format!("el-{}", self.elements.len());
        self.elements.insert(id.clone(), locator.clone());
        Ok(ElementId(id))
    }

    fn click(&mut self, element: &ElementId) -> Result<(), DriverError> {
        let locator = self.locator_of(element)?;
        self.record(Call::Click(locator))
    }

    fn send_keys(&mut self, element: &ElementId, text: &str) -> Result<(), DriverError> {
        let locator = self.locator_of(element)?;
        self.record(Call::SendKeys(locator, text.to_string()))
    }

    fn window_size(&mut self) -> Result<ScreenSize, DriverError> {
        self.record(Call::WindowSize)?;
        Ok(self.screen)
    }

    fn swipe(&mut self, from: Point, to: Point, duration: Duration) -> Result<(), DriverError> {
        self.record(Call::Swipe(from, to, duration))
    }

    fn tap(&mut self, at: Point) -> Result<(), DriverError> {
        self.record(Call::Tap(at))
    }

    fn press_keycode(&mut self, keycode: u32) -> Result<(), DriverError> {
        self.record(Call::Keycode(keycode))
    }

    fn close_app(&mut self) -> Result<(), DriverError> {
        self.record(Call::CloseApp)
    }

    fn launch_app(&mut self) -> Result<(), DriverError> {
        self.record(Call::LaunchApp)
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        self.record(Call::Quit)
    }

    fn reconnect(&mut self) -> Result<(), DriverError> {
        self.expires_at = None;
        self.record(Call::Reconnect)
    }
}
