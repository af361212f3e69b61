use std::time::Duration;

use tracing::debug;

use crate::driver::{Driver, DriverCall, DriverResponse, WaitState};
use crate::errors::{AutomationError, ErrorKind, Result};

/// Ordered alternatives for locating one logical UI target. Candidates
/// are tried left to right; the first that works wins.
#[derive(Debug, Clone)]
pub struct LocatorCandidates {
    pub target: String,
    pub selectors: Vec<String>,
}

impl LocatorCandidates {
    pub fn new<S, I, T>(target: S, selectors: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            target: target.into(),
            selectors: selectors.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

/// The candidate that succeeded and its position in the list.
#[derive(Debug, Clone)]
pub struct ProbeHit {
    pub selector: String,
    pub index: usize,
}

/// Tries locator candidates against the driver with a short per-candidate
/// timeout, swallowing individual misses. Only exhaustion of the whole
/// list surfaces as an error, and that error is terminal.
pub struct Prober<'a> {
    driver: &'a Driver,
    per_candidate_timeout: Duration,
}

impl<'a> Prober<'a> {
    pub fn new(driver: &'a Driver, per_candidate_timeout: Duration) -> Self {
        Self {
            driver,
            per_candidate_timeout,
        }
    }

    pub async fn click(&self, list: &LocatorCandidates) -> Result<ProbeHit> {
        let timeout_ms = self.per_candidate_timeout.as_millis() as u64;
        self.probe(list, |selector| DriverCall::Click {
            selector,
            timeout_ms,
        })
        .await
        .map(|(hit, _)| hit)
    }

    pub async fn fill(&self, list: &LocatorCandidates, value: &str) -> Result<ProbeHit> {
        self.probe(list, |selector| DriverCall::Fill {
            selector,
            value: value.to_string(),
        })
        .await
        .map(|(hit, _)| hit)
    }

    pub async fn select_option(&self, list: &LocatorCandidates, value: &str) -> Result<ProbeHit> {
        self.probe(list, |selector| DriverCall::SelectOption {
            selector,
            value: value.to_string(),
        })
        .await
        .map(|(hit, _)| hit)
    }

    /// First candidate that becomes visible within the per-candidate wait.
    pub async fn wait_visible(&self, list: &LocatorCandidates) -> Result<ProbeHit> {
        let timeout_ms = self.per_candidate_timeout.as_millis() as u64;
        self.probe(list, |selector| DriverCall::WaitForSelector {
            selector,
            timeout_ms,
            state: WaitState::Visible,
        })
        .await
        .map(|(hit, _)| hit)
    }

    pub async fn get_text(&self, list: &LocatorCandidates) -> Result<(ProbeHit, String)> {
        self.probe(list, |selector| DriverCall::GetText { selector })
            .await
            .map(|(hit, response)| {
                let text = response.text().unwrap_or_default().to_string();
                (hit, text)
            })
    }

    async fn probe<F>(
        &self,
        list: &LocatorCandidates,
        mut make_call: F,
    ) -> Result<(ProbeHit, DriverResponse)>
    where
        F: FnMut(String) -> DriverCall,
    {
        for (index, selector) in list.selectors.iter().enumerate() {
            let call = make_call(selector.clone());
            match self.driver.attempt(call, self.per_candidate_timeout).await {
                Ok(response) => {
                    debug!(target = %list.target, %selector, index, "candidate matched");
                    return Ok((
                        ProbeHit {
                            selector: selector.clone(),
                            index,
                        },
                        response,
                    ));
                }
                Err(err) => {
                    debug!(target = %list.target, %selector, error = %err, "candidate missed");
                }
            }
        }
        Err(AutomationError::fatal(
            ErrorKind::ElementNotFound,
            format!("no locator candidate matched for {}", list.target),
        )
        .with_selector(&list.target))
    }
}
