//! Phone-number login
//!
//! Walks the app's login screens, asking the operator for the phone number
//! and the SMS verification code on the console.

use std::io::{self, BufRead, Write};

use crate::clock::Clock;
use crate::config::settings::{LoginLocators, TimingSettings};
use crate::driver::{wait_and_click, Driver, DriverError, Locator};

/// Android `KEYCODE_0`; digits follow consecutively
const KEYCODE_DIGIT_0: u32 = 7;
/// Mainland mobile numbers are 11 digits
const PHONE_DIGITS: usize = 11;

/// Source of operator input
pub trait Prompt {
    /// Show `message` and read one line
    fn ask(&mut self, message: &str) -> io::Result<String>;
}

/// Prompt on stdout, answer on stdin
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn ask(&mut self, message: &str) -> io::Result<String> {
        let mut stdout = io::stdout();
        writeln!(stdout, "{}", message)?;
        stdout.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }
}

/// Login errors
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Phone number must be 11 digits, got {0:?}")]
    InvalidPhoneNumber(String),
    #[error("Verification code is empty")]
    EmptyCode,
    #[error("Failed to read input: {0}")]
    Input(#[from] io::Error),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Check and normalize a phone number
pub fn parse_phone_number(input: &str) -> Result<Vec<u32>, LoginError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    let digits: Option<Vec<u32>> = compact.chars().map(|c| c.to_digit(10)).collect();

    match digits {
        Some(digits) if digits.len() == PHONE_DIGITS => Ok(digits),
        _ => Err(LoginError::InvalidPhoneNumber(input.to_string())),
    }
}

/// Android key code for a decimal digit
pub fn digit_keycode(digit: u32) -> u32 {
    KEYCODE_DIGIT_0 + digit
}

/// Drives the login screens
pub struct LoginFlow<'a, D: ?Sized, C: ?Sized> {
    driver: &'a mut D,
    clock: &'a mut C,
    locators: &'a LoginLocators,
    timings: &'a TimingSettings,
}

impl<'a, D, C> LoginFlow<'a, D, C>
where
    D: Driver + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(
        driver: &'a mut D,
        clock: &'a mut C,
        locators: &'a LoginLocators,
        timings: &'a TimingSettings,
    ) -> Self {
        Self {
            driver,
            clock,
            locators,
            timings,
        }
    }

    /// Run the whole flow
    pub fn run<P: Prompt + ?Sized>(&mut self, prompt: &mut P) -> Result<(), LoginError> {
        let l = self.locators;
        log::info!("Starting login");
        self.clock.sleep(self.timings.login_settle());

        self.click_now(&l.red_packet)?;
        self.click_after_wait(&l.earn_more)?;
        self.click_after_wait(&l.agree_terms)?;
        self.click_quick(&l.other_number)?;

        let phone = prompt.ask("Phone number (11 digits):")?;
        let digits = parse_phone_number(&phone)?;
        // The number field drops characters when filled via send_keys
        for digit in digits {
            self.driver.press_keycode(digit_keycode(digit))?;
        }
        self.click_now(&l.confirm_number)?;

        self.click_now(&l.request_code)?;
        let code_input = self.driver.find_element(&l.code_input)?;
        let code = prompt.ask("Verification code:")?;
        if code.is_empty() {
            return Err(LoginError::EmptyCode);
        }
        self.driver.send_keys(&code_input, &code)?;
        self.click_now(&l.submit)?;

        self.click_after_wait(&l.earn_more_after_login)?;
        self.click_after_wait(&l.skip_guide)?;

        log::info!("Login finished");
        Ok(())
    }

    fn click_now(&mut self, locator: &Locator) -> Result<(), DriverError> {
        let element = self.driver.find_element(locator)?;
        self.driver.click(&element)
    }

    fn click_after_wait(&mut self, locator: &Locator) -> Result<(), DriverError> {
        let (timeout, poll) = (self.timings.long_wait(), self.timings.poll());
        wait_and_click(&mut *self.driver, &mut *self.clock, locator, timeout, poll)
    }

    fn click_quick(&mut self, locator: &Locator) -> Result<(), DriverError> {
        let (timeout, poll) = (self.timings.notice_wait(), self.timings.poll());
        wait_and_click(&mut *self.driver, &mut *self.clock, locator, timeout, poll)
    }
}
