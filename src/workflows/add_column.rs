use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::context::WorkflowContext;
use super::nav::ensure_table_open;
use crate::errors::Result;
use crate::locator::LocatorCandidates;

/// What to build: a column named `name`, computed by the enrichment type
/// shown in the picker under `enrichment_type`, optionally fed from
/// `source_column`, tuned by free-form `settings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    pub name: String,
    pub enrichment_type: String,
    #[serde(default)]
    pub source_column: Option<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddColumnRequest {
    pub table_id: String,
    pub enrichment: EnrichmentConfig,
}

/// Caller-side validation companion; the orchestrator assumes it passed.
pub fn validate_add_column_request(request: &AddColumnRequest) -> bool {
    !request.table_id.trim().is_empty()
        && !request.enrichment.name.trim().is_empty()
        && !request.enrichment.enrichment_type.trim().is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddColumnStatus {
    Created,
    /// Saved, but the confirming column header was never observed.
    Unverified,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddColumnOutcome {
    pub success: bool,
    pub status: AddColumnStatus,
    pub column_name: String,
}

fn add_column_control() -> LocatorCandidates {
    LocatorCandidates::new(
        "add column control",
        [
            "[data-testid='add-column']",
            "button[aria-label='Add column']",
            ".add-column-button",
            "text=Add column",
        ],
    )
}

fn column_panel() -> LocatorCandidates {
    LocatorCandidates::new(
        "column configuration panel",
        [
            "[data-testid='column-panel']",
            ".column-config-panel",
            "[role='dialog']",
        ],
    )
}

fn enrichment_type_option(label: &str) -> LocatorCandidates {
    LocatorCandidates::new(
        format!("enrichment type '{label}'"),
        [
            format!("[data-enrichment-type='{label}']"),
            format!("[data-testid='enrichment-type-{label}']"),
            format!("text={label}"),
        ],
    )
}

fn name_field() -> LocatorCandidates {
    LocatorCandidates::new(
        "column name field",
        [
            "[data-testid='column-name']",
            "input[name='columnName']",
            "input[placeholder*='Column name']",
        ],
    )
}

fn source_column_select() -> LocatorCandidates {
    LocatorCandidates::new(
        "source column select",
        [
            "[data-testid='source-column']",
            "select[name='sourceColumn']",
            ".source-column-picker select",
        ],
    )
}

fn setting_field(key: &str) -> LocatorCandidates {
    LocatorCandidates::new(
        format!("setting '{key}'"),
        [
            format!("[data-setting='{key}']"),
            format!("[data-testid='setting-{key}']"),
            format!("input[name='{key}']"),
        ],
    )
}

fn save_control() -> LocatorCandidates {
    LocatorCandidates::new(
        "save column control",
        [
            "[data-testid='save-column']",
            "button[type='submit']",
            "text=Save",
        ],
    )
}

fn column_header(name: &str) -> LocatorCandidates {
    LocatorCandidates::new(
        format!("header for column '{name}'"),
        [
            format!("[data-column-name='{name}']"),
            format!("th[title='{name}']"),
            format!("text={name}"),
        ],
    )
}

/// Add a data-enrichment column to the table. Required controls missing
/// is terminal; optional ones (source column, individual settings) are
/// skipped with a warning.
pub async fn add_enrichment_column(
    ctx: &WorkflowContext,
    request: &AddColumnRequest,
) -> Result<AddColumnOutcome> {
    let config = &request.enrichment;
    ctx.log.info(format!(
        "adding enrichment column '{}' ({}) to {}",
        config.name, config.enrichment_type, request.table_id
    ));

    ensure_table_open(ctx, &request.table_id).await?;
    let prober = ctx.prober();

    if let Err(err) = prober.click(&add_column_control()).await {
        return Err(ctx.fail_with_screenshot(err, "add-column-control-missing").await);
    }
    if let Err(err) = prober.wait_visible(&column_panel()).await {
        return Err(ctx.fail_with_screenshot(err, "column-panel-missing").await);
    }
    if let Err(err) = prober
        .click(&enrichment_type_option(&config.enrichment_type))
        .await
    {
        return Err(ctx.fail_with_screenshot(err, "enrichment-type-missing").await);
    }
    if let Err(err) = prober.fill(&name_field(), &config.name).await {
        return Err(ctx.fail_with_screenshot(err, "column-name-field-missing").await);
    }

    if let Some(source) = &config.source_column {
        if prober
            .select_option(&source_column_select(), source)
            .await
            .is_err()
        {
            ctx.log.warn(format!(
                "source column control not found; skipping '{source}'"
            ));
        }
    }
    for (key, value) in &config.settings {
        if prober.fill(&setting_field(key), value).await.is_err() {
            ctx.log.warn(format!("setting control '{key}' not found; skipping"));
        }
    }

    if let Err(err) = prober.click(&save_control()).await {
        return Err(ctx.fail_with_screenshot(err, "save-column-missing").await);
    }

    let status = match prober.wait_visible(&column_header(&config.name)).await {
        Ok(_) => {
            ctx.log.success(format!("column '{}' created", config.name));
            AddColumnStatus::Created
        }
        Err(_) => {
            ctx.log.warn(format!(
                "could not confirm column '{}' appeared; continuing",
                config.name
            ));
            AddColumnStatus::Unverified
        }
    };

    Ok(AddColumnOutcome {
        success: true,
        status,
        column_name: config.name.clone(),
    })
}
