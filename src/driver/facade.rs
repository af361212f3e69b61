use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value;

use super::protocol::{DriverCall, DriverResponse, WaitState};
use crate::config::AutomationConfig;
use crate::errors::{AutomationError, ErrorKind, Result};
use crate::events::EventLog;

/// The single channel to the host automation backend: one async function
/// taking an operation name and an argument object.
#[async_trait]
pub trait DriverHandler: Send + Sync {
    async fn call(&self, op: &str, args: Value) -> anyhow::Result<Value>;
}

/// Facade over the injected handler. Every operation logs a status line,
/// races the handler against a per-call timeout, settles briefly after
/// success, and translates failures into typed errors with a disposition
/// fixed per operation category.
pub struct Driver {
    handler: Mutex<Option<Arc<dyn DriverHandler>>>,
    config: AutomationConfig,
    log: Arc<EventLog>,
    current_url: Mutex<Option<String>>,
}

impl Driver {
    pub fn new(config: AutomationConfig, log: Arc<EventLog>) -> Self {
        Self {
            handler: Mutex::new(None),
            config,
            log,
            current_url: Mutex::new(None),
        }
    }

    /// Bind the backend channel. Without a bound handler only dry runs
    /// can execute.
    pub fn connect(&self, handler: Arc<dyn DriverHandler>) {
        *self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn is_connected(&self) -> bool {
        self.handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Last URL observed from a navigation response. Workflows use this
    /// to skip navigation when the target is already open.
    pub fn current_url(&self) -> Option<String> {
        self.current_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember_url(&self, url: Option<String>) {
        if let Some(url) = url {
            *self
                .current_url
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(url);
        }
    }

    /// Issue one call with an explicit timeout ceiling. This is the
    /// uniform entry point the selector prober drives with short
    /// per-candidate timeouts; the named operations below use defaults.
    pub async fn attempt(&self, call: DriverCall, timeout: Duration) -> Result<DriverResponse> {
        self.log.info(format!("driver: {}", call.describe()));

        if self.config.dry_run {
            tokio::time::sleep(self.config.timeouts.dry_run_delay()).await;
            let response = DriverResponse::simulated(&call);
            if matches!(call, DriverCall::Navigate { .. }) {
                self.remember_url(response.url().map(str::to_string));
            }
            return Ok(response);
        }

        let handler = self
            .handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                AutomationError::fatal(ErrorKind::NetworkError, "driver handler not connected")
            })?;

        let (kind, retryable) = disposition(&call);
        let raw = match tokio::time::timeout(timeout, handler.call(call.op_name(), call.args())).await
        {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                let mut err = AutomationError::new(
                    kind,
                    format!("{} failed: {err:#}", call.op_name()),
                    retryable,
                );
                if let Some(selector) = call.selector() {
                    err = err.with_selector(selector);
                }
                return Err(err);
            }
            Err(_) => {
                let mut err = AutomationError::timeout(format!(
                    "{} timed out after {}ms",
                    call.op_name(),
                    timeout.as_millis()
                ));
                if let Some(selector) = call.selector() {
                    err = err.with_selector(selector);
                }
                return Err(err);
            }
        };

        if needs_settle(&call) {
            tokio::time::sleep(self.config.timeouts.settle()).await;
        }

        let response = DriverResponse::new(raw);
        if matches!(
            call,
            DriverCall::Navigate { .. } | DriverCall::WaitForNavigation { .. }
        ) {
            self.remember_url(response.url().map(str::to_string));
        }
        Ok(response)
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        let call = DriverCall::Navigate {
            url: url.to_string(),
            wait_until: "domcontentloaded".to_string(),
        };
        let response = self.attempt(call, self.config.timeouts.navigation()).await?;
        // handlers that do not echo a final URL fall back to the target
        if response.url().is_none() {
            self.remember_url(Some(url.to_string()));
        }
        Ok(())
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        let timeout = self.config.timeouts.element_wait();
        let call = DriverCall::Click {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };
        self.attempt(call, timeout).await.map(|_| ())
    }

    pub async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let call = DriverCall::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        };
        self.attempt(call, self.config.timeouts.element_wait())
            .await
            .map(|_| ())
    }

    pub async fn wait_for_selector(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let timeout = timeout.unwrap_or_else(|| self.config.timeouts.element_wait());
        let call = DriverCall::WaitForSelector {
            selector: selector.to_string(),
            timeout_ms: timeout.as_millis() as u64,
            state,
        };
        self.attempt(call, timeout).await.map(|_| ())
    }

    /// Capture a screenshot; the handler may answer with a saved path or
    /// inline base64 bytes, which land under the profile directory.
    pub async fn screenshot(&self, name: &str, full_page: bool) -> Result<Option<PathBuf>> {
        let call = DriverCall::Screenshot {
            name: name.to_string(),
            full_page,
        };
        let response = self.attempt(call, self.config.timeouts.element_wait()).await?;

        if let Some(path) = response.screenshot_path() {
            return Ok(Some(PathBuf::from(path)));
        }
        if let Some(data) = response.screenshot_data() {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|err| {
                    AutomationError::fatal(
                        ErrorKind::Unknown,
                        format!("screenshot payload was not valid base64: {err}"),
                    )
                })?;
            let dir = self.config.profile_dir.join("screenshots");
            fs::create_dir_all(&dir)?;
            let path = dir.join(format!("{name}.png"));
            fs::write(&path, bytes)?;
            return Ok(Some(path));
        }
        Ok(None)
    }

    /// Best-effort capture for error reporting. Its own failure is logged
    /// and swallowed, never escalated.
    pub async fn screenshot_on_error(&self, name: &str) -> Option<PathBuf> {
        match self.screenshot(name, true).await {
            Ok(path) => path,
            Err(err) => {
                self.log.warn(format!("screenshot capture failed: {err}"));
                None
            }
        }
    }

    pub async fn get_text(&self, selector: &str) -> Result<String> {
        let call = DriverCall::GetText {
            selector: selector.to_string(),
        };
        let response = self.attempt(call, self.config.timeouts.element_wait()).await?;
        Ok(response.text().unwrap_or_default().to_string())
    }

    pub async fn get_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let call = DriverCall::GetAttribute {
            selector: selector.to_string(),
            attribute: attribute.to_string(),
        };
        let response = self.attempt(call, self.config.timeouts.element_wait()).await?;
        Ok(response.attribute().map(str::to_string))
    }

    /// Never errors: any underlying failure degrades to `false`.
    pub async fn is_visible(&self, selector: &str) -> bool {
        let call = DriverCall::IsVisible {
            selector: selector.to_string(),
        };
        match self.attempt(call, self.config.timeouts.element_wait()).await {
            Ok(response) => response.visible(),
            Err(_) => false,
        }
    }

    pub async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        let call = DriverCall::SelectOption {
            selector: selector.to_string(),
            value: value.to_string(),
        };
        self.attempt(call, self.config.timeouts.element_wait())
            .await
            .map(|_| ())
    }

    pub async fn upload_file(&self, selector: &str, path: &str) -> Result<()> {
        let call = DriverCall::UploadFile {
            selector: selector.to_string(),
            path: path.to_string(),
        };
        self.attempt(call, self.config.timeouts.element_wait())
            .await
            .map(|_| ())
    }

    pub async fn press_key(&self, key: &str) -> Result<()> {
        let call = DriverCall::Press {
            key: key.to_string(),
        };
        self.attempt(call, self.config.timeouts.element_wait())
            .await
            .map(|_| ())
    }

    pub async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        let call = DriverCall::ScrollIntoView {
            selector: selector.to_string(),
        };
        self.attempt(call, self.config.timeouts.element_wait())
            .await
            .map(|_| ())
    }

    pub async fn wait_for_navigation(&self, timeout: Option<Duration>) -> Result<()> {
        let timeout = timeout.unwrap_or_else(|| self.config.timeouts.navigation());
        let call = DriverCall::WaitForNavigation {
            timeout_ms: timeout.as_millis() as u64,
        };
        self.attempt(call, timeout).await.map(|_| ())
    }

    pub async fn close(&self) -> Result<()> {
        self.attempt(DriverCall::Close, self.config.timeouts.element_wait())
            .await
            .map(|_| ())
    }
}

/// Error kind and retryable flag, fixed per operation category.
fn disposition(call: &DriverCall) -> (ErrorKind, bool) {
    match call {
        DriverCall::Navigate { .. } | DriverCall::WaitForNavigation { .. } => {
            (ErrorKind::NavigationFailed, true)
        }
        DriverCall::Click { .. }
        | DriverCall::Fill { .. }
        | DriverCall::SelectOption { .. }
        | DriverCall::Press { .. }
        | DriverCall::ScrollIntoView { .. } => (ErrorKind::ElementNotClickable, true),
        DriverCall::WaitForSelector { .. }
        | DriverCall::GetText { .. }
        | DriverCall::GetAttribute { .. }
        | DriverCall::IsVisible { .. } => (ErrorKind::ElementNotFound, false),
        DriverCall::UploadFile { .. } => (ErrorKind::UploadFailed, true),
        DriverCall::Screenshot { .. } | DriverCall::Close => (ErrorKind::Unknown, false),
    }
}

/// Mutating operations pause briefly after success so the target UI is
/// not overwhelmed; pure queries do not.
fn needs_settle(call: &DriverCall) -> bool {
    !matches!(
        call,
        DriverCall::GetText { .. }
            | DriverCall::GetAttribute { .. }
            | DriverCall::IsVisible { .. }
            | DriverCall::Screenshot { .. }
            | DriverCall::Close
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn test_config(dry_run: bool) -> AutomationConfig {
        let mut config = AutomationConfig::default();
        config.dry_run = dry_run;
        config.timeouts.settle_ms = 0;
        config.timeouts.dry_run_delay_ms = 5;
        config.timeouts.element_wait_ms = 200;
        config.timeouts.navigation_ms = 200;
        config
    }

    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DriverHandler for CountingHandler {
        async fn call(&self, _op: &str, _args: Value) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"success": true}))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl DriverHandler for FailingHandler {
        async fn call(&self, op: &str, _args: Value) -> anyhow::Result<Value> {
            Err(anyhow!("{op} rejected by backend"))
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl DriverHandler for SlowHandler {
        async fn call(&self, _op: &str, _args: Value) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(json!({"success": true}))
        }
    }

    #[tokio::test]
    async fn dry_run_never_touches_the_handler() {
        let handler = Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
        });
        let driver = Driver::new(test_config(true), Arc::new(EventLog::new()));
        driver.connect(handler.clone());

        let started = Instant::now();
        driver.navigate("https://app.example.com/tables/t1").await.unwrap();
        driver.click("[data-testid='run']").await.unwrap();
        driver.fill("input[name='q']", "acme").await.unwrap();
        driver
            .wait_for_selector(".grid", WaitState::Visible, None)
            .await
            .unwrap();
        assert!(!driver.is_visible(".spinner").await);
        assert_eq!(driver.screenshot("snap", false).await.unwrap(), None);
        driver.press_key("Enter").await.unwrap();
        driver.close().await.unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
        // eight operations, each behind the simulated delay
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn dry_run_navigation_tracks_url() {
        let driver = Driver::new(test_config(true), Arc::new(EventLog::new()));
        driver.navigate("https://app.example.com/tables/t9").await.unwrap();
        assert_eq!(
            driver.current_url().as_deref(),
            Some("https://app.example.com/tables/t9")
        );
    }

    #[tokio::test]
    async fn failures_map_to_fixed_dispositions() {
        let driver = Driver::new(test_config(false), Arc::new(EventLog::new()));
        driver.connect(Arc::new(FailingHandler));

        let click = driver.click("#save").await.unwrap_err();
        assert_eq!(click.kind, ErrorKind::ElementNotClickable);
        assert!(click.retryable);
        assert_eq!(click.selector.as_deref(), Some("#save"));

        let wait = driver
            .wait_for_selector("#grid", WaitState::Visible, None)
            .await
            .unwrap_err();
        assert_eq!(wait.kind, ErrorKind::ElementNotFound);
        assert!(!wait.retryable);

        let nav = driver.navigate("https://x").await.unwrap_err();
        assert_eq!(nav.kind, ErrorKind::NavigationFailed);
        assert!(nav.retryable);

        let upload = driver.upload_file("#file", "/tmp/a.csv").await.unwrap_err();
        assert_eq!(upload.kind, ErrorKind::UploadFailed);
    }

    #[tokio::test]
    async fn timer_win_produces_retryable_timeout() {
        let driver = Driver::new(test_config(false), Arc::new(EventLog::new()));
        driver.connect(Arc::new(SlowHandler));

        let err = driver
            .attempt(
                DriverCall::Click {
                    selector: "#go".to_string(),
                    timeout_ms: 30,
                },
                Duration::from_millis(30),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.retryable);
    }

    #[tokio::test]
    async fn is_visible_degrades_to_false() {
        let driver = Driver::new(test_config(false), Arc::new(EventLog::new()));
        driver.connect(Arc::new(FailingHandler));
        assert!(!driver.is_visible(".anything").await);
    }

    #[tokio::test]
    async fn unconnected_driver_refuses_live_calls() {
        let driver = Driver::new(test_config(false), Arc::new(EventLog::new()));
        let err = driver.click("#x").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkError);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn every_call_logs_a_status_line() {
        let log = Arc::new(EventLog::new());
        let driver = Driver::new(test_config(true), log.clone());
        driver.click("#run").await.unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].message.contains("driver: click #run"));
    }
}
