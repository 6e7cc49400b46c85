//! App-level interactions
//!
//! Everything that knows about the short-video app's screens: feed
//! gestures, the reward page and the login flow.

pub mod login;
pub mod tasks;

pub use login::{ConsolePrompt, LoginError, LoginFlow, Prompt};
pub use tasks::AppTasks;
