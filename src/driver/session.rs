//! Appium session over the WebDriver HTTP protocol
//!
//! Speaks the W3C endpoints plus the `appium/device/*` extensions needed
//! for key presses and app lifecycle. Falls back to legacy JSON Wire
//! response shapes where older servers still use them.

use std::time::Duration;

use serde_json::{json, Value};
use ureq::Agent;

use super::{Driver, DriverError, ElementId, Locator, Point, ScreenSize};
use crate::config::settings::Capabilities;

/// W3C web element reference key
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
/// Legacy JSON Wire element reference key
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";
/// Legacy JSON Wire status code for a missing element
const LEGACY_NO_SUCH_ELEMENT: i64 = 7;

/// Live session against an Appium server
pub struct AppiumSession {
    agent: Agent,
    /// Server base URL without trailing slash
    base_url: String,
    /// Session id assigned by the server
    session_id: Option<String>,
    /// Package of the app under test
    app_package: String,
    /// New-session payload, kept for reconnects
    new_session: Value,
}

impl AppiumSession {
    /// Open a new session with the given capabilities
    pub fn connect(
        server_url: &str,
        capabilities: &Capabilities,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, DriverError> {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(request_timeout)
            .build();

        let mut session = Self {
            agent,
            base_url: server_url.trim_end_matches('/').to_string(),
            session_id: None,
            app_package: capabilities.app_package.clone(),
            new_session: capabilities_body(capabilities),
        };

        log::info!(
            "Opening Appium session at {} for {} on {}",
            session.base_url,
            capabilities.app_package,
            capabilities.device_name
        );
        session.open()?;

        Ok(session)
    }

    fn open(&mut self) -> Result<(), DriverError> {
        let response = self.request("POST", "/session", Some(self.new_session.clone()))?;
        let session_id = parse_session_id(&response)?;
        log::info!("Session {} established", session_id);
        self.session_id = Some(session_id);
        Ok(())
    }

    fn session_path(&self, suffix: &str) -> Result<String, DriverError> {
        let id = self.session_id.as_deref().ok_or(DriverError::NoSession)?;
        Ok(format!("/session/{}{}", id, suffix))
    }

    /// Issue a request and return the parsed JSON body
    fn request(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value, DriverError> {
        let url = format!("{}{}", self.base_url, path);
        log::trace!("{} {}", method, url);

        let request = self
            .agent
            .request(method, &url)
            .set("Content-Type", "application/json; charset=utf-8");

        let result = match body {
            Some(body) => request.send_string(&body.to_string()),
            None => request.call(),
        };

        match result {
            Ok(response) => {
                let text = response
                    .into_string()
                    .map_err(|e| DriverError::InvalidResponse(e.to_string()))?;
                let value = parse_body(&text)?;
                check_legacy_status(&value)?;
                Ok(value)
            }
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                Err(error_from_body(code, &text))
            }
            Err(ureq::Error::Transport(e)) => Err(DriverError::Transport(e.to_string())),
        }
    }

    fn session_post(&self, suffix: &str, body: Value) -> Result<Value, DriverError> {
        let path = self.session_path(suffix)?;
        self.request("POST", &path, Some(body))
    }

    fn perform_actions(&self, steps: Vec<Value>) -> Result<(), DriverError> {
        self.session_post(
            "/actions",
            json!({
                "actions": [{
                    "type": "pointer",
                    "id": "finger1",
                    "parameters": { "pointerType": "touch" },
                    "actions": steps,
                }]
            }),
        )?;
        Ok(())
    }
}

impl Driver for AppiumSession {
    fn find_element(&mut self, locator: &Locator) -> Result<ElementId, DriverError> {
        let response = self.session_post(
            "/element",
            json!({ "using": locator.strategy(), "value": locator.value() }),
        )?;
        parse_element_id(&response)
    }

    fn click(&mut self, element: &ElementId) -> Result<(), DriverError> {
        self.session_post(&format!("/element/{}/click", element.0), json!({}))?;
        Ok(())
    }

    fn send_keys(&mut self, element: &ElementId, text: &str) -> Result<(), DriverError> {
        let chars: Vec<String> = text.chars().map(String::from).collect();
        self.session_post(
            &format!("/element/{}/value", element.0),
            json!({ "text": text, "value": chars }),
        )?;
        Ok(())
    }

    fn window_size(&mut self) -> Result<ScreenSize, DriverError> {
        let path = self.session_path("/window/rect")?;
        let response = self.request("GET", &path, None)?;
        parse_window_size(&response)
    }

    fn swipe(&mut self, from: Point, to: Point, duration: Duration) -> Result<(), DriverError> {
        self.perform_actions(swipe_steps(from, to, duration))
    }

    fn tap(&mut self, at: Point) -> Result<(), DriverError> {
        self.perform_actions(tap_steps(at))
    }

    fn press_keycode(&mut self, keycode: u32) -> Result<(), DriverError> {
        self.session_post("/appium/device/press_keycode", json!({ "keycode": keycode }))?;
        Ok(())
    }

    fn close_app(&mut self) -> Result<(), DriverError> {
        log::debug!("Terminating {}", self.app_package);
        self.session_post(
            "/appium/device/terminate_app",
            json!({ "appId": self.app_package }),
        )?;
        Ok(())
    }

    fn launch_app(&mut self) -> Result<(), DriverError> {
        log::debug!("Activating {}", self.app_package);
        self.session_post(
            "/appium/device/activate_app",
            json!({ "appId": self.app_package }),
        )?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), DriverError> {
        let path = self.session_path("")?;
        self.request("DELETE", &path, None)?;
        log::info!("Session {} closed", path.trim_start_matches("/session/"));
        self.session_id = None;
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), DriverError> {
        if self.session_id.is_some() {
            // the server may already have dropped it
            if let Err(e) = self.quit() {
                log::debug!("Old session not closed: {}", e);
            }
            self.session_id = None;
        }
        log::info!("Reconnecting to {}", self.base_url);
        self.open()
    }
}

impl Drop for AppiumSession {
    fn drop(&mut self) {
        if self.session_id.is_some() {
            if let Err(e) = self.quit() {
                log::warn!("Failed to close session: {}", e);
            }
        }
    }
}

/// New-session payload carrying both W3C and legacy capability forms
pub fn capabilities_body(caps: &Capabilities) -> Value {
    let mut w3c = json!({
        "platformName": caps.platform_name,
        "appium:deviceName": caps.device_name,
        "appium:appPackage": caps.app_package,
        "appium:appActivity": caps.app_activity,
        "appium:noReset": caps.no_reset,
        "appium:newCommandTimeout": caps.new_command_timeout_secs,
    });
    let mut legacy = json!({
        "platformName": caps.platform_name,
        "deviceName": caps.device_name,
        "appPackage": caps.app_package,
        "appActivity": caps.app_activity,
        "noReset": caps.no_reset,
        "newCommandTimeout": caps.new_command_timeout_secs,
    });

    if let Some(automation) = &caps.automation_name {
        w3c["appium:automationName"] = json!(automation);
        legacy["automationName"] = json!(automation);
    }

    json!({
        "capabilities": { "alwaysMatch": w3c, "firstMatch": [{}] },
        "desiredCapabilities": legacy,
    })
}

fn swipe_steps(from: Point, to: Point, duration: Duration) -> Vec<Value> {
    vec![
        json!({ "type": "pointerMove", "duration": 0, "x": from.x, "y": from.y }),
        json!({ "type": "pointerDown", "button": 0 }),
        json!({
            "type": "pointerMove",
            "duration": duration.as_millis() as u64,
            "origin": "viewport",
            "x": to.x,
            "y": to.y,
        }),
        json!({ "type": "pointerUp", "button": 0 }),
    ]
}

fn tap_steps(at: Point) -> Vec<Value> {
    vec![
        json!({ "type": "pointerMove", "duration": 0, "x": at.x, "y": at.y }),
        json!({ "type": "pointerDown", "button": 0 }),
        json!({ "type": "pause", "duration": 80 }),
        json!({ "type": "pointerUp", "button": 0 }),
    ]
}

fn parse_body(text: &str) -> Result<Value, DriverError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| DriverError::InvalidResponse(e.to_string()))
}

/// Old servers answer 200 with a non-zero `status` on failure
fn check_legacy_status(body: &Value) -> Result<(), DriverError> {
    match body.get("status").and_then(Value::as_i64) {
        None | Some(0) => Ok(()),
        Some(LEGACY_NO_SUCH_ELEMENT) => Err(DriverError::NoSuchElement(error_message(body))),
        Some(status) => Err(DriverError::Command {
            code: status.to_string(),
            message: error_message(body),
        }),
    }
}

fn error_message(body: &Value) -> String {
    body.pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Map a non-2xx WebDriver response to an error
pub fn error_from_body(http_status: u16, text: &str) -> DriverError {
    let Ok(body) = serde_json::from_str::<Value>(text) else {
        return DriverError::Command {
            code: http_status.to_string(),
            message: text.to_string(),
        };
    };

    let message = error_message(&body);
    match body.pointer("/value/error").and_then(Value::as_str) {
        Some("no such element") => DriverError::NoSuchElement(message),
        Some("invalid session id") => DriverError::NoSession,
        Some(code) => DriverError::Command {
            code: code.to_string(),
            message,
        },
        None => match check_legacy_status(&body) {
            Err(e) => e,
            Ok(()) => DriverError::Command {
                code: http_status.to_string(),
                message,
            },
        },
    }
}

fn parse_session_id(body: &Value) -> Result<String, DriverError> {
    body.pointer("/value/sessionId")
        .or_else(|| body.get("sessionId"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DriverError::InvalidResponse(format!("no session id in {}", body)))
}

fn parse_element_id(body: &Value) -> Result<ElementId, DriverError> {
    let value = body
        .get("value")
        .ok_or_else(|| DriverError::InvalidResponse("missing value".to_string()))?;

    value
        .get(W3C_ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(|id| ElementId(id.to_string()))
        .ok_or_else(|| DriverError::InvalidResponse(format!("no element reference in {}", value)))
}

fn parse_window_size(body: &Value) -> Result<ScreenSize, DriverError> {
    let width = body.pointer("/value/width").and_then(Value::as_f64);
    let height = body.pointer("/value/height").and_then(Value::as_f64);

    match (width, height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Ok(ScreenSize::new(w as u32, h as u32)),
        _ => Err(DriverError::InvalidResponse(format!("bad window rect {}", body))),
    }
}
