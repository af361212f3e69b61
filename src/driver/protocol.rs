use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Element state accepted by `wait_for_selector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitState {
    Visible,
    Attached,
    Hidden,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Attached => "attached",
            WaitState::Hidden => "hidden",
        }
    }
}

/// One operation on the driver channel, keyed by operation name. The
/// argument shapes here are the wire contract with the host backend.
#[derive(Debug, Clone)]
pub enum DriverCall {
    Navigate { url: String, wait_until: String },
    Click { selector: String, timeout_ms: u64 },
    Fill { selector: String, value: String },
    WaitForSelector { selector: String, timeout_ms: u64, state: WaitState },
    Screenshot { name: String, full_page: bool },
    GetText { selector: String },
    GetAttribute { selector: String, attribute: String },
    IsVisible { selector: String },
    SelectOption { selector: String, value: String },
    UploadFile { selector: String, path: String },
    Press { key: String },
    ScrollIntoView { selector: String },
    WaitForNavigation { timeout_ms: u64 },
    Close,
}

impl DriverCall {
    pub fn op_name(&self) -> &'static str {
        match self {
            DriverCall::Navigate { .. } => "navigate",
            DriverCall::Click { .. } => "click",
            DriverCall::Fill { .. } => "fill",
            DriverCall::WaitForSelector { .. } => "wait_for_selector",
            DriverCall::Screenshot { .. } => "screenshot",
            DriverCall::GetText { .. } => "get_text",
            DriverCall::GetAttribute { .. } => "get_attribute",
            DriverCall::IsVisible { .. } => "is_visible",
            DriverCall::SelectOption { .. } => "select_option",
            DriverCall::UploadFile { .. } => "upload_file",
            DriverCall::Press { .. } => "press",
            DriverCall::ScrollIntoView { .. } => "scroll_into_view",
            DriverCall::WaitForNavigation { .. } => "wait_for_navigation",
            DriverCall::Close => "close",
        }
    }

    pub fn args(&self) -> Value {
        match self {
            DriverCall::Navigate { url, wait_until } => {
                json!({ "url": url, "waitUntil": wait_until })
            }
            DriverCall::Click { selector, timeout_ms } => {
                json!({ "selector": selector, "timeout": timeout_ms })
            }
            DriverCall::Fill { selector, value } => {
                json!({ "selector": selector, "value": value })
            }
            DriverCall::WaitForSelector { selector, timeout_ms, state } => {
                json!({ "selector": selector, "timeout": timeout_ms, "state": state.as_str() })
            }
            DriverCall::Screenshot { name, full_page } => {
                json!({ "name": name, "fullPage": full_page })
            }
            DriverCall::GetText { selector } => json!({ "selector": selector }),
            DriverCall::GetAttribute { selector, attribute } => {
                json!({ "selector": selector, "attribute": attribute })
            }
            DriverCall::IsVisible { selector } => json!({ "selector": selector }),
            DriverCall::SelectOption { selector, value } => {
                json!({ "selector": selector, "value": value })
            }
            DriverCall::UploadFile { selector, path } => {
                json!({ "selector": selector, "path": path })
            }
            DriverCall::Press { key } => json!({ "key": key }),
            DriverCall::ScrollIntoView { selector } => json!({ "selector": selector }),
            DriverCall::WaitForNavigation { timeout_ms } => json!({ "timeout": timeout_ms }),
            DriverCall::Close => json!({}),
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            DriverCall::Click { selector, .. }
            | DriverCall::Fill { selector, .. }
            | DriverCall::WaitForSelector { selector, .. }
            | DriverCall::GetText { selector }
            | DriverCall::GetAttribute { selector, .. }
            | DriverCall::IsVisible { selector }
            | DriverCall::SelectOption { selector, .. }
            | DriverCall::UploadFile { selector, .. }
            | DriverCall::ScrollIntoView { selector } => Some(selector),
            _ => None,
        }
    }

    /// Human-readable status line logged before the call is issued.
    pub fn describe(&self) -> String {
        match self {
            DriverCall::Navigate { url, .. } => format!("navigate {url}"),
            DriverCall::Press { key } => format!("press {key}"),
            DriverCall::Screenshot { name, .. } => format!("screenshot {name}"),
            DriverCall::WaitForNavigation { timeout_ms } => {
                format!("wait_for_navigation ({timeout_ms}ms)")
            }
            DriverCall::Close => "close".to_string(),
            other => match other.selector() {
                Some(selector) => format!("{} {selector}", other.op_name()),
                None => other.op_name().to_string(),
            },
        }
    }
}

/// Typed view over the loose JSON a handler returns. Validated here at
/// the facade boundary so callers never touch the raw shape.
#[derive(Debug, Clone)]
pub struct DriverResponse(Value);

impl DriverResponse {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// Successful result a dry run hands back without touching the handler.
    pub fn simulated(call: &DriverCall) -> Self {
        let raw = match call {
            DriverCall::Navigate { url, .. } => json!({ "url": url }),
            DriverCall::IsVisible { .. } => json!({ "visible": false }),
            DriverCall::GetText { .. } => json!({ "text": "" }),
            DriverCall::GetAttribute { .. } => json!({ "value": null }),
            _ => json!({ "success": true }),
        };
        Self(raw)
    }

    pub fn url(&self) -> Option<&str> {
        match &self.0 {
            Value::String(url) => Some(url),
            Value::Object(map) => map.get("url").and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.0 {
            Value::String(text) => Some(text),
            Value::Object(map) => map
                .get("text")
                .or_else(|| map.get("value"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn attribute(&self) -> Option<&str> {
        match &self.0 {
            Value::String(value) => Some(value),
            Value::Object(map) => map
                .get("value")
                .or_else(|| map.get("attribute"))
                .and_then(Value::as_str),
            _ => None,
        }
    }

    pub fn visible(&self) -> bool {
        match &self.0 {
            Value::Bool(flag) => *flag,
            Value::Object(map) => map
                .get("visible")
                .or_else(|| map.get("result"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn screenshot_path(&self) -> Option<&str> {
        self.0.get("path").and_then(Value::as_str)
    }

    /// Base64 image payload, for handlers that return bytes inline.
    pub fn screenshot_data(&self) -> Option<&str> {
        self.0.get("data").and_then(Value::as_str)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }
}
