use std::time::Duration;

use url::Url;

use super::context::WorkflowContext;
use crate::errors::{AutomationError, ErrorKind, Result};
use crate::locator::LocatorCandidates;
use crate::retry::{retry, RetryPolicy};

pub(crate) fn join_url(base_url: &str, path: &str) -> Result<String> {
    let base = Url::parse(base_url).map_err(|err| {
        AutomationError::fatal(
            ErrorKind::NavigationFailed,
            format!("invalid base url {base_url}: {err}"),
        )
    })?;
    let joined = base.join(path).map_err(|err| {
        AutomationError::fatal(
            ErrorKind::NavigationFailed,
            format!("cannot join {path} onto {base_url}: {err}"),
        )
    })?;
    Ok(joined.to_string())
}

pub(crate) fn table_url(base_url: &str, table_id: &str) -> Result<String> {
    join_url(base_url, &format!("tables/{table_id}"))
}

fn table_grid_markers() -> LocatorCandidates {
    LocatorCandidates::new(
        "table grid",
        [
            "[data-testid='table-grid']",
            ".table-grid",
            "[role='grid']",
        ],
    )
}

/// Open the table unless the current location already references it.
/// Falls back to the workspace search box when the direct route does not
/// land on a grid; only both routes failing is terminal.
pub(crate) async fn ensure_table_open(ctx: &WorkflowContext, table_id: &str) -> Result<()> {
    if let Some(url) = ctx.driver.current_url() {
        if url.contains(table_id) {
            ctx.log.info(format!("table {table_id} already open"));
            return Ok(());
        }
    }

    let url = table_url(&ctx.config.base_url, table_id)?;
    ctx.log.info(format!("opening table {table_id}"));
    let policy = RetryPolicy::exponential(3, Duration::from_millis(750));
    retry(&policy, || ctx.driver.navigate(&url)).await?;

    let prober = ctx.prober();
    if prober.wait_visible(&table_grid_markers()).await.is_ok() {
        return Ok(());
    }

    ctx.log.warn(format!(
        "direct route to {table_id} did not land on a grid; trying search"
    ));
    search_for_table(ctx, table_id).await
}

async fn search_for_table(ctx: &WorkflowContext, table_id: &str) -> Result<()> {
    let prober = ctx.prober();
    let search_box = LocatorCandidates::new(
        "table search box",
        [
            "[data-testid='search-input']",
            "input[type='search']",
            "input[placeholder*='Search']",
        ],
    );
    let first_result = LocatorCandidates::new(
        "first table search result",
        [
            "[data-testid='search-result']",
            ".search-result-item",
            "[role='option']",
        ],
    );
    let grid = table_grid_markers();

    let attempt: Result<()> = async {
        prober.click(&search_box).await?;
        prober.fill(&search_box, table_id).await?;
        ctx.driver.press_key("Enter").await?;
        prober.click(&first_result).await?;
        prober.wait_visible(&grid).await?;
        Ok(())
    }
    .await;

    match attempt {
        Ok(()) => {
            ctx.log.success(format!("found table {table_id} through search"));
            Ok(())
        }
        Err(err) => {
            let screenshot = ctx
                .driver
                .screenshot_on_error(&format!("table-missing-{table_id}"))
                .await;
            let mut terminal = AutomationError::fatal(
                ErrorKind::TableNotFound,
                format!("table {table_id} could not be located: {err}"),
            );
            if let Some(path) = screenshot {
                terminal = terminal.with_screenshot(path);
            }
            Err(terminal)
        }
    }
}
