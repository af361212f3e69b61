use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of failure categories raised anywhere in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    AuthFailed,
    SessionExpired,
    ElementNotFound,
    ElementNotClickable,
    Timeout,
    NavigationFailed,
    TableNotFound,
    UploadFailed,
    EnrichmentFailed,
    ExportFailed,
    NetworkError,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "AUTH_FAILED",
            ErrorKind::SessionExpired => "SESSION_EXPIRED",
            ErrorKind::ElementNotFound => "ELEMENT_NOT_FOUND",
            ErrorKind::ElementNotClickable => "ELEMENT_NOT_CLICKABLE",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::NavigationFailed => "NAVIGATION_FAILED",
            ErrorKind::TableNotFound => "TABLE_NOT_FOUND",
            ErrorKind::UploadFailed => "UPLOAD_FAILED",
            ErrorKind::EnrichmentFailed => "ENRICHMENT_FAILED",
            ErrorKind::ExportFailed => "EXPORT_FAILED",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

/// A typed automation failure. The retryable disposition is fixed at the
/// point the error is raised, never inferred later.
#[derive(Error, Debug, Clone)]
#[error("{}: {}", .kind.as_str(), .message)]
pub struct AutomationError {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
    pub screenshot: Option<PathBuf>,
    pub selector: Option<String>,
}

impl AutomationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            screenshot: None,
            selector: None,
        }
    }

    /// A transient failure worth another attempt.
    pub fn retryable(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, true)
    }

    /// A terminal failure; the retry primitive will not consume further
    /// attempts on it.
    pub fn fatal(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message, true)
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot = Some(path.into());
        self
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<std::io::Error> for AutomationError {
    fn from(err: std::io::Error) -> Self {
        AutomationError::fatal(ErrorKind::Unknown, format!("io error: {err}"))
    }
}

impl From<serde_json::Error> for AutomationError {
    fn from(err: serde_json::Error) -> Self {
        AutomationError::fatal(ErrorKind::Unknown, format!("serialization error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;
