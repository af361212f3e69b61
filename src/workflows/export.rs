use serde::{Deserialize, Serialize};

use super::context::WorkflowContext;
use super::nav::ensure_table_open;
use crate::errors::{AutomationError, ErrorKind, Result};
use crate::locator::LocatorCandidates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }

    /// The label the format option carries in the export menu.
    fn label(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "CSV",
            ExportFormat::Xlsx => "XLSX",
            ExportFormat::Json => "JSON",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub table_id: String,
    /// Where the host saves the download; passed through to the filename
    /// field when the export dialog offers one.
    pub output_path: String,
    pub format: ExportFormat,
    #[serde(default)]
    pub include_columns: Option<Vec<String>>,
}

/// Caller-side validation companion; the orchestrator assumes it passed.
pub fn validate_export_request(request: &ExportRequest) -> bool {
    !request.table_id.trim().is_empty() && !request.output_path.trim().is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Completed,
    /// Export was confirmed but no completion signal was observed.
    Unverified,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub success: bool,
    pub status: ExportStatus,
    pub output_path: String,
    pub format: ExportFormat,
}

fn export_menu_control() -> LocatorCandidates {
    LocatorCandidates::new(
        "export menu control",
        [
            "[data-testid='export-menu']",
            "button[aria-label='Export']",
            ".export-button",
            "text=Export",
        ],
    )
}

fn format_select() -> LocatorCandidates {
    LocatorCandidates::new(
        "export format select",
        [
            "[data-testid='export-format']",
            "select[name='exportFormat']",
        ],
    )
}

fn format_option(format: ExportFormat) -> LocatorCandidates {
    LocatorCandidates::new(
        format!("export format option '{}'", format.as_str()),
        [
            format!("[data-format='{}']", format.as_str()),
            format!("[data-testid='export-{}']", format.as_str()),
            format!("text={}", format.label()),
        ],
    )
}

fn column_toggle(column: &str) -> LocatorCandidates {
    LocatorCandidates::new(
        format!("column toggle '{column}'"),
        [
            format!("[data-column-toggle='{column}']"),
            format!("input[name='include-{column}']"),
            format!("[data-testid='export-column-{column}']"),
        ],
    )
}

fn filename_field() -> LocatorCandidates {
    LocatorCandidates::new(
        "export filename field",
        [
            "[data-testid='export-filename']",
            "input[name='filename']",
        ],
    )
}

fn confirm_control() -> LocatorCandidates {
    LocatorCandidates::new(
        "export confirm control",
        [
            "[data-testid='export-confirm']",
            ".export-dialog button[type='submit']",
            "text=Download",
        ],
    )
}

fn completion_signal() -> LocatorCandidates {
    LocatorCandidates::new(
        "export completion signal",
        [
            "[data-testid='export-complete']",
            ".download-toast",
            "text=Export ready",
        ],
    )
}

/// Export the table through the UI's export dialog. A missing export or
/// confirm control is terminal; column restriction and the completion
/// signal are best-effort.
pub async fn export_results(
    ctx: &WorkflowContext,
    request: &ExportRequest,
) -> Result<ExportOutcome> {
    ctx.log.info(format!(
        "exporting {} as {} to {}",
        request.table_id,
        request.format.as_str(),
        request.output_path
    ));

    ensure_table_open(ctx, &request.table_id).await?;
    let prober = ctx.prober();

    if let Err(err) = prober.click(&export_menu_control()).await {
        let err = AutomationError::fatal(
            ErrorKind::ExportFailed,
            format!("export control not found on {}: {err}", request.table_id),
        );
        return Err(ctx.fail_with_screenshot(err, "export-control-missing").await);
    }

    // a select element where the dialog has one, plain options otherwise
    let format_chosen = prober
        .select_option(&format_select(), request.format.as_str())
        .await
        .is_ok()
        || prober.click(&format_option(request.format)).await.is_ok();
    if !format_chosen {
        let err = AutomationError::fatal(
            ErrorKind::ExportFailed,
            format!(
                "no control accepted export format '{}'",
                request.format.as_str()
            ),
        );
        return Err(ctx.fail_with_screenshot(err, "export-format-missing").await);
    }

    if let Some(columns) = &request.include_columns {
        for column in columns {
            if prober.click(&column_toggle(column)).await.is_err() {
                ctx.log.warn(format!(
                    "column toggle '{column}' not found; exporting without it"
                ));
            }
        }
    }

    if prober
        .fill(&filename_field(), &request.output_path)
        .await
        .is_err()
    {
        ctx.log.warn("no filename field in the export dialog; using its default");
    }

    if let Err(err) = prober.click(&confirm_control()).await {
        let err = AutomationError::fatal(
            ErrorKind::ExportFailed,
            format!("export confirm control not found: {err}"),
        );
        return Err(ctx.fail_with_screenshot(err, "export-confirm-missing").await);
    }

    let status = match prober.wait_visible(&completion_signal()).await {
        Ok(_) => {
            ctx.log.success(format!(
                "export of {} finished ({})",
                request.table_id,
                request.format.as_str()
            ));
            ExportStatus::Completed
        }
        Err(_) => {
            ctx.log
                .warn("export completion signal not observed; the download may still arrive");
            ExportStatus::Unverified
        }
    };

    Ok(ExportOutcome {
        success: true,
        status,
        output_path: request.output_path.clone(),
        format: request.format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutomationConfig;
    use crate::driver::{Driver, DriverHandler};
    use crate::events::{EventLog, LogLevel};
    use crate::session::SessionStore;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn demo_request() -> ExportRequest {
        ExportRequest {
            table_id: "tbl_leads".to_string(),
            output_path: "/exports/leads.csv".to_string(),
            format: ExportFormat::Csv,
            include_columns: Some(vec!["Company".to_string(), "Icebreaker".to_string()]),
        }
    }

    struct SelectiveHandler {
        failing_fragments: Vec<&'static str>,
        failing_ops: Vec<&'static str>,
    }

    #[async_trait]
    impl DriverHandler for SelectiveHandler {
        async fn call(&self, op: &str, args: Value) -> anyhow::Result<Value> {
            let selector = args
                .get("selector")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if self.failing_ops.contains(&op)
                || self
                    .failing_fragments
                    .iter()
                    .any(|fragment| selector.contains(fragment))
            {
                return Err(anyhow!("{op} rejected for {selector}"));
            }
            match op {
                "navigate" => Ok(json!({"url": args["url"]})),
                "screenshot" => Ok(json!({"path": "/tmp/export.png"})),
                _ => Ok(json!({"success": true})),
            }
        }
    }

    fn context_with(
        handler: Arc<dyn DriverHandler>,
        profile_dir: &std::path::Path,
    ) -> WorkflowContext {
        let mut config = AutomationConfig::default();
        config.profile_dir = profile_dir.to_path_buf();
        config.timeouts.settle_ms = 0;
        config.timeouts.probe_candidate_ms = 50;
        let log = Arc::new(EventLog::new());
        let driver = Arc::new(Driver::new(config.clone(), log.clone()));
        driver.connect(handler);
        let sessions = Arc::new(SessionStore::from_config(&config));
        WorkflowContext::new(driver, log, sessions, config)
    }

    #[test]
    fn validation_requires_table_and_output_path() {
        let mut request = demo_request();
        assert!(validate_export_request(&request));

        request.output_path = "  ".to_string();
        assert!(!validate_export_request(&request));

        request = demo_request();
        request.table_id = String::new();
        assert!(!validate_export_request(&request));
    }

    #[tokio::test]
    async fn export_completes_when_every_control_is_present() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(SelectiveHandler {
            failing_fragments: vec![],
            failing_ops: vec![],
        });
        let ctx = context_with(handler, dir.path());

        let outcome = export_results(&ctx, &demo_request()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, ExportStatus::Completed);
        assert_eq!(outcome.format, ExportFormat::Csv);
    }

    #[tokio::test]
    async fn missing_export_control_is_terminal_export_failure() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(SelectiveHandler {
            failing_fragments: vec!["export-menu", "aria-label='Export'", "export-button", "text=Export"],
            failing_ops: vec![],
        });
        let ctx = context_with(handler, dir.path());

        let err = export_results(&ctx, &demo_request()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ExportFailed);
        assert!(!err.retryable);
        assert!(err.screenshot.is_some());
    }

    #[tokio::test]
    async fn format_click_fallback_covers_a_missing_select() {
        let dir = tempdir().unwrap();
        // the dialog has no <select>; the per-format option must be clicked
        let handler = Arc::new(SelectiveHandler {
            failing_fragments: vec![],
            failing_ops: vec!["select_option"],
        });
        let ctx = context_with(handler, dir.path());

        let outcome = export_results(&ctx, &demo_request()).await.unwrap();
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn missing_column_toggles_warn_and_continue() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(SelectiveHandler {
            failing_fragments: vec!["Icebreaker"],
            failing_ops: vec![],
        });
        let ctx = context_with(handler, dir.path());

        let outcome = export_results(&ctx, &demo_request()).await.unwrap();
        assert!(outcome.success);
        assert!(ctx.log.entries().iter().any(|entry| {
            entry.level == LogLevel::Warn && entry.message.contains("'Icebreaker'")
        }));
    }

    #[tokio::test]
    async fn unobserved_completion_signal_downgrades_to_unverified() {
        let dir = tempdir().unwrap();
        let handler = Arc::new(SelectiveHandler {
            failing_fragments: vec!["export-complete", "download-toast", "Export ready"],
            failing_ops: vec![],
        });
        let ctx = context_with(handler, dir.path());

        let outcome = export_results(&ctx, &demo_request()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, ExportStatus::Unverified);
    }
}
