use std::sync::Arc;

use crate::config::AutomationConfig;
use crate::driver::Driver;
use crate::errors::AutomationError;
use crate::events::EventLog;
use crate::locator::Prober;
use crate::session::SessionStore;

/// Per-invocation bundle handed to every orchestrator. Built by the
/// composition root, discarded at workflow exit, never persisted.
pub struct WorkflowContext {
    pub driver: Arc<Driver>,
    pub log: Arc<EventLog>,
    pub sessions: Arc<SessionStore>,
    pub config: AutomationConfig,
    pub run_id: String,
}

impl WorkflowContext {
    pub fn new(
        driver: Arc<Driver>,
        log: Arc<EventLog>,
        sessions: Arc<SessionStore>,
        config: AutomationConfig,
    ) -> Self {
        Self {
            driver,
            log,
            sessions,
            config,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// A prober bound to this context's driver and probe timeout.
    pub fn prober(&self) -> Prober<'_> {
        Prober::new(&self.driver, self.config.timeouts.probe_candidate())
    }

    /// Attach a best-effort screenshot to a terminal error before it is
    /// handed back to the caller. Capture failure never changes the error.
    pub async fn fail_with_screenshot(
        &self,
        err: AutomationError,
        shot_name: &str,
    ) -> AutomationError {
        match self.driver.screenshot_on_error(shot_name).await {
            Some(path) => err.with_screenshot(path),
            None => err,
        }
    }
}
