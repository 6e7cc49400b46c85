//! Touch gesture generation
//!
//! Gestures are described as fractions of the screen so they work on any
//! resolution, then resolved to pixels against the measured window size.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Driver, DriverError};

/// Pixel coordinate on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Window size as reported by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    /// Create a new screen size
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Resolve a fractional position to pixels
    pub fn point(&self, fx: f64, fy: f64) -> Point {
        Point {
            x: (fx * self.width as f64).round() as i32,
            y: (fy * self.height as f64).round() as i32,
        }
    }

    /// Screen center
    pub fn center(&self) -> Point {
        self.point(0.5, 0.5)
    }
}

/// A resolved touch gesture
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// Tap at a pixel coordinate
    Tap(Point),
    /// Swipe from one point to another
    Swipe {
        from: Point,
        to: Point,
        duration: Duration,
    },
}

impl Gesture {
    /// Send this gesture through a driver
    pub fn perform<D: Driver + ?Sized>(&self, driver: &mut D) -> Result<(), DriverError> {
        match self {
            Gesture::Tap(at) => driver.tap(*at),
            Gesture::Swipe { from, to, duration } => driver.swipe(*from, *to, *duration),
        }
    }
}

/// Vertical feed swipes start and end this far from the screen edges
const FEED_TOP: f64 = 1.0 / 7.0;
const FEED_BOTTOM: f64 = 6.0 / 7.0;

/// Builds feed gestures for a given screen
pub struct GestureGenerator {
    screen: ScreenSize,
    swipe_duration: Duration,
}

impl GestureGenerator {
    /// Create a new gesture generator
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            screen,
            swipe_duration: Duration::from_millis(500),
        }
    }

    /// Set swipe duration
    pub fn with_swipe_duration(mut self, duration: Duration) -> Self {
        self.swipe_duration = duration;
        self
    }

    /// Swipe up: bring the next video into view
    pub fn next_video(&self) -> Gesture {
        Gesture::Swipe {
            from: self.screen.point(0.5, FEED_BOTTOM),
            to: self.screen.point(0.5, FEED_TOP),
            duration: self.swipe_duration,
        }
    }

    /// Swipe down: go back to the previous video
    pub fn previous_video(&self) -> Gesture {
        Gesture::Swipe {
            from: self.screen.point(0.5, FEED_TOP),
            to: self.screen.point(0.5, FEED_BOTTOM),
            duration: self.swipe_duration,
        }
    }

    /// Tap the middle of the screen
    pub fn tap_center(&self) -> Gesture {
        Gesture::Tap(self.screen.center())
    }
}
