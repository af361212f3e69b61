use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::WorkflowContext;
use super::nav::ensure_table_open;
use crate::driver::Driver;
use crate::errors::{AutomationError, ErrorKind, Result};
use crate::locator::LocatorCandidates;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEnrichmentRequest {
    pub table_id: String,
    /// Restrict the run to these columns; `None` runs every enrichment
    /// column the table has.
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default = "default_wait")]
    pub wait_for_completion: bool,
}

fn default_wait() -> bool {
    true
}

/// Caller-side validation companion; the orchestrator assumes it passed.
pub fn validate_run_enrichment_request(request: &RunEnrichmentRequest) -> bool {
    !request.table_id.trim().is_empty()
        && request
            .columns
            .as_ref()
            .map_or(true, |columns| {
                !columns.is_empty() && columns.iter().all(|c| !c.trim().is_empty())
            })
}

/// Progression of one enrichment run. Terminal states are `Completed`,
/// `Failed` and `TimedOut`; an unawaited run is left at `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Navigating,
    LocatingRunControl,
    Confirming,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl RunState {
    fn as_str(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::Navigating => "navigating",
            RunState::LocatingRunControl => "locating_run_control",
            RunState::Confirming => "confirming",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::TimedOut => "timed_out",
        }
    }

    fn advance(self, ctx: &WorkflowContext, next: RunState) -> RunState {
        ctx.log
            .info(format!("enrichment {} -> {}", self.as_str(), next.as_str()));
        next
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Running,
    Completed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunEnrichmentOutcome {
    pub success: bool,
    pub status: EnrichmentStatus,
    pub rows_processed: Option<u64>,
    pub elapsed: Duration,
}

fn run_all_control() -> LocatorCandidates {
    LocatorCandidates::new(
        "run enrichment control",
        [
            "[data-testid='run-enrichment']",
            "button[aria-label='Run all']",
            ".run-all-button",
            "text=Run all",
        ],
    )
}

fn column_run_control(column: &str) -> LocatorCandidates {
    LocatorCandidates::new(
        format!("run control for column '{column}'"),
        [
            format!("[data-run-column='{column}']"),
            format!("[data-testid='run-column-{column}']"),
            format!("[data-column-name='{column}'] button[aria-label='Run']"),
        ],
    )
}

fn confirm_run_control() -> LocatorCandidates {
    LocatorCandidates::new(
        "run confirmation",
        [
            "[data-testid='confirm-run']",
            "[role='dialog'] button[type='submit']",
            "text=Confirm",
        ],
    )
}

fn running_indicator() -> LocatorCandidates {
    LocatorCandidates::new(
        "running indicator",
        [
            "[data-testid='enrichment-running']",
            ".enrichment-spinner",
            "[aria-label='Enrichment running']",
        ],
    )
}

fn completion_marker() -> LocatorCandidates {
    LocatorCandidates::new(
        "completion marker",
        [
            "[data-testid='enrichment-complete']",
            ".enrichment-complete-badge",
            "text=Enrichment complete",
        ],
    )
}

fn error_marker() -> LocatorCandidates {
    LocatorCandidates::new(
        "error marker",
        [
            "[data-testid='enrichment-error']",
            ".enrichment-error-banner",
            "[role='alert']",
        ],
    )
}

fn progress_label() -> LocatorCandidates {
    LocatorCandidates::new(
        "progress label",
        [
            "[data-testid='enrichment-progress']",
            ".enrichment-progress-label",
            ".run-status-text",
        ],
    )
}

/// `is_visible` never throws, so checking a whole candidate list is a
/// plain left-to-right scan.
async fn any_visible(driver: &Driver, list: &LocatorCandidates) -> bool {
    for selector in &list.selectors {
        if driver.is_visible(selector).await {
            return true;
        }
    }
    false
}

/// Kick off the enrichment run and, unless the caller opts out, poll it
/// to a terminal state. The ceiling being reached is reported as an
/// explicit `TimedOut` status, never as a completion.
pub async fn run_enrichment(
    ctx: &WorkflowContext,
    request: &RunEnrichmentRequest,
) -> Result<RunEnrichmentOutcome> {
    let started = Instant::now();
    let mut state = RunState::NotStarted;

    state = state.advance(ctx, RunState::Navigating);
    ensure_table_open(ctx, &request.table_id).await?;

    state = state.advance(ctx, RunState::LocatingRunControl);
    let prober = ctx.prober();
    match &request.columns {
        Some(columns) => {
            let mut clicked = 0usize;
            for column in columns {
                match prober.click(&column_run_control(column)).await {
                    Ok(_) => clicked += 1,
                    Err(_) => ctx.log.warn(format!(
                        "run control for column '{column}' not found; skipping"
                    )),
                }
            }
            if clicked == 0 {
                let err = AutomationError::fatal(
                    ErrorKind::ElementNotFound,
                    format!(
                        "no run control found for any of the {} requested columns",
                        columns.len()
                    ),
                );
                return Err(ctx.fail_with_screenshot(err, "run-control-missing").await);
            }
        }
        None => {
            if let Err(err) = prober.click(&run_all_control()).await {
                return Err(ctx.fail_with_screenshot(err, "run-control-missing").await);
            }
        }
    }

    state = state.advance(ctx, RunState::Confirming);
    if prober.click(&confirm_run_control()).await.is_err() {
        ctx.log.info("no confirmation dialog; run starts directly");
    }

    state = state.advance(ctx, RunState::Running);
    if !request.wait_for_completion {
        ctx.log.info(format!(
            "enrichment started on {}; not waiting for completion",
            request.table_id
        ));
        return Ok(RunEnrichmentOutcome {
            success: true,
            status: EnrichmentStatus::Running,
            rows_processed: None,
            elapsed: started.elapsed(),
        });
    }

    let interval = ctx.config.timeouts.poll_interval();
    let ceiling = ctx.config.timeouts.enrichment_max_wait();
    let progress_re = Regex::new(r"(\d+)\s*(?:/|of)\s*(\d+)").ok();
    let mut rows_processed = None;
    let mut indicator_seen = prober.wait_visible(&running_indicator()).await.is_ok();
    if !indicator_seen {
        ctx.log.warn("running indicator not observed yet; polling anyway");
    }

    loop {
        if started.elapsed() >= ceiling {
            state.advance(ctx, RunState::TimedOut);
            ctx.log.warn(format!(
                "enrichment did not finish within {}s; giving up the wait",
                ceiling.as_secs()
            ));
            return Ok(RunEnrichmentOutcome {
                success: false,
                status: EnrichmentStatus::TimedOut,
                rows_processed,
                elapsed: started.elapsed(),
            });
        }
        tokio::time::sleep(interval).await;

        if any_visible(&ctx.driver, &error_marker()).await {
            state.advance(ctx, RunState::Failed);
            let err = AutomationError::fatal(
                ErrorKind::EnrichmentFailed,
                format!("enrichment on {} reported an error", request.table_id),
            );
            return Err(ctx.fail_with_screenshot(err, "enrichment-error").await);
        }

        if any_visible(&ctx.driver, &completion_marker()).await {
            state.advance(ctx, RunState::Completed);
            ctx.log.success(format!("enrichment on {} completed", request.table_id));
            return Ok(RunEnrichmentOutcome {
                success: true,
                status: EnrichmentStatus::Completed,
                rows_processed,
                elapsed: started.elapsed(),
            });
        }

        // best-effort progress scrape; feeds the bar, never ends the loop
        if let Ok((_, text)) = prober.get_text(&progress_label()).await {
            if let Some(re) = &progress_re {
                if let Some(caps) = re.captures(&text) {
                    let done = caps[1].parse::<u64>().unwrap_or(0);
                    let total = caps[2].parse::<u64>().unwrap_or(0);
                    if total > 0 {
                        rows_processed = Some(done);
                        let percent = (done as f64 / total as f64) * 100.0;
                        ctx.log.progress(percent, &format!("{done} / {total} rows"));
                    }
                }
            }
        }

        if any_visible(&ctx.driver, &running_indicator()).await {
            indicator_seen = true;
        } else if indicator_seen {
            // indicator cleared: settle, then one clean error re-check
            tokio::time::sleep(ctx.config.timeouts.settle()).await;
            if any_visible(&ctx.driver, &error_marker()).await {
                state.advance(ctx, RunState::Failed);
                let err = AutomationError::fatal(
                    ErrorKind::EnrichmentFailed,
                    format!(
                        "enrichment on {} reported an error after the indicator cleared",
                        request.table_id
                    ),
                );
                return Err(ctx.fail_with_screenshot(err, "enrichment-error").await);
            }
            state.advance(ctx, RunState::Completed);
            ctx.log.success("running indicator cleared; treating enrichment as complete");
            return Ok(RunEnrichmentOutcome {
                success: true,
                status: EnrichmentStatus::Completed,
                rows_processed,
                elapsed: started.elapsed(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutomationConfig;
    use crate::driver::DriverHandler;
    use crate::events::EventLog;
    use crate::session::SessionStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    const POLL_MS: u64 = 25;

    fn request(wait: bool) -> RunEnrichmentRequest {
        RunEnrichmentRequest {
            table_id: "tbl_leads".to_string(),
            columns: None,
            wait_for_completion: wait,
        }
    }

    fn polling_context(
        handler: Arc<dyn DriverHandler>,
        profile_dir: &std::path::Path,
        max_wait_ms: u64,
    ) -> WorkflowContext {
        let mut config = AutomationConfig::default();
        config.profile_dir = profile_dir.to_path_buf();
        config.timeouts.settle_ms = 0;
        config.timeouts.probe_candidate_ms = 50;
        config.timeouts.poll_interval_ms = POLL_MS;
        config.timeouts.enrichment_max_wait_ms = max_wait_ms;
        let log = Arc::new(EventLog::new());
        let driver = Arc::new(Driver::new(config.clone(), log.clone()));
        driver.connect(handler);
        let sessions = Arc::new(SessionStore::from_config(&config));
        WorkflowContext::new(driver, log, sessions, config)
    }

    /// Scripted table page: interactions succeed, visibility answers are
    /// driven by which markers this run should show and when.
    struct EnrichmentPageHandler {
        complete_after_checks: Option<usize>,
        error_visible: bool,
        indicator_gone_after_checks: Option<usize>,
        completion_checks: AtomicUsize,
        indicator_checks: AtomicUsize,
    }

    impl EnrichmentPageHandler {
        fn completing_after(checks: usize) -> Self {
            Self {
                complete_after_checks: Some(checks),
                error_visible: false,
                indicator_gone_after_checks: None,
                completion_checks: AtomicUsize::new(0),
                indicator_checks: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                complete_after_checks: None,
                error_visible: true,
                indicator_gone_after_checks: None,
                completion_checks: AtomicUsize::new(0),
                indicator_checks: AtomicUsize::new(0),
            }
        }

        fn never_finishing() -> Self {
            Self {
                complete_after_checks: None,
                error_visible: false,
                indicator_gone_after_checks: None,
                completion_checks: AtomicUsize::new(0),
                indicator_checks: AtomicUsize::new(0),
            }
        }

        fn indicator_clearing_after(checks: usize) -> Self {
            Self {
                complete_after_checks: None,
                error_visible: false,
                indicator_gone_after_checks: Some(checks),
                completion_checks: AtomicUsize::new(0),
                indicator_checks: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DriverHandler for EnrichmentPageHandler {
        async fn call(&self, op: &str, args: Value) -> anyhow::Result<Value> {
            let selector = args
                .get("selector")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match op {
                "navigate" => Ok(json!({"url": args["url"]})),
                "screenshot" => Ok(json!({"path": "/tmp/enrichment.png"})),
                "get_text" => Ok(json!({"text": "12 / 100 rows"})),
                "is_visible" => {
                    // count only the first candidate of each marker list,
                    // one check per poll tick; the fallbacks answer false
                    let visible = if selector.contains("enrichment-error") {
                        self.error_visible
                    } else if selector == "[data-testid='enrichment-complete']" {
                        let seen = self.completion_checks.fetch_add(1, Ordering::SeqCst);
                        self.complete_after_checks
                            .map_or(false, |after| seen + 1 >= after)
                    } else if selector == "[data-testid='enrichment-running']" {
                        let seen = self.indicator_checks.fetch_add(1, Ordering::SeqCst);
                        self.indicator_gone_after_checks
                            .map_or(true, |after| seen + 1 < after)
                    } else {
                        false
                    };
                    Ok(json!({"visible": visible}))
                }
                _ => Ok(json!({"success": true})),
            }
        }
    }

    #[test]
    fn validation_rejects_blank_ids_and_empty_column_lists() {
        assert!(validate_run_enrichment_request(&request(true)));

        let mut bad = request(true);
        bad.table_id = " ".to_string();
        assert!(!validate_run_enrichment_request(&bad));

        let mut empty_columns = request(true);
        empty_columns.columns = Some(vec![]);
        assert!(!validate_run_enrichment_request(&empty_columns));
    }

    #[tokio::test]
    async fn completion_on_second_tick_takes_two_poll_intervals() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(EnrichmentPageHandler::completing_after(2));
        let ctx = polling_context(handler, dir.path(), 10_000);

        let outcome = run_enrichment(&ctx, &request(true)).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, EnrichmentStatus::Completed);
        // the first tick scrapes progress before the completion check passes
        assert_eq!(outcome.rows_processed, Some(12));
        assert!(outcome.elapsed >= Duration::from_millis(2 * POLL_MS));
        assert!(
            outcome.elapsed < Duration::from_millis(5 * POLL_MS),
            "took {:?}",
            outcome.elapsed
        );
    }

    #[tokio::test]
    async fn error_marker_raises_terminal_enrichment_failure() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(EnrichmentPageHandler::failing());
        let ctx = polling_context(handler, dir.path(), 10_000);

        let err = run_enrichment(&ctx, &request(true)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::EnrichmentFailed);
        assert!(!err.retryable);
        assert_eq!(err.screenshot.as_deref(), Some("/tmp/enrichment.png".as_ref()));
    }

    #[tokio::test]
    async fn ceiling_reached_reports_timed_out_not_completed() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(EnrichmentPageHandler::never_finishing());
        let ctx = polling_context(handler, dir.path(), 3 * POLL_MS);

        let outcome = run_enrichment(&ctx, &request(true)).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, EnrichmentStatus::TimedOut);
    }

    #[tokio::test]
    async fn indicator_disappearance_counts_as_completion_after_clean_recheck() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(EnrichmentPageHandler::indicator_clearing_after(3));
        let ctx = polling_context(handler, dir.path(), 10_000);

        let outcome = run_enrichment(&ctx, &request(true)).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, EnrichmentStatus::Completed);
    }

    #[tokio::test]
    async fn opting_out_of_waiting_returns_running_immediately() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(EnrichmentPageHandler::never_finishing());
        let ctx = polling_context(handler, dir.path(), 10_000);

        let outcome = run_enrichment(&ctx, &request(false)).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, EnrichmentStatus::Running);
        assert!(outcome.elapsed < Duration::from_millis(2 * POLL_MS));
    }

    #[tokio::test]
    async fn per_column_controls_warn_on_missing_and_fail_when_none_match() {
        struct NoColumnControls;

        #[async_trait]
        impl DriverHandler for NoColumnControls {
            async fn call(&self, op: &str, args: Value) -> anyhow::Result<Value> {
                let selector = args
                    .get("selector")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                match op {
                    "navigate" => Ok(json!({"url": args["url"]})),
                    "click" if selector.contains("run-column") || selector.contains("data-run-column") => {
                        Err(anyhow::anyhow!("no element matches {selector}"))
                    }
                    "click" if selector.contains("aria-label='Run'") => {
                        Err(anyhow::anyhow!("no element matches {selector}"))
                    }
                    "is_visible" => Ok(json!({"visible": false})),
                    _ => Ok(json!({"success": true})),
                }
            }
        }

        let dir = tempdir().unwrap();
        let ctx = polling_context(Arc::new(NoColumnControls), dir.path(), 10_000);
        let mut req = request(true);
        req.columns = Some(vec!["Company size".to_string(), "Revenue".to_string()]);

        let err = run_enrichment(&ctx, &req).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ElementNotFound);
        assert!(err.message.contains("2 requested columns"));
    }
}
