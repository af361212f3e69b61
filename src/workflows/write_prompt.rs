use serde::{Deserialize, Serialize};

use super::context::WorkflowContext;
use super::nav::ensure_table_open;
use crate::errors::Result;
use crate::locator::LocatorCandidates;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub column_name: String,
    pub prompt_text: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub output_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritePromptRequest {
    pub table_id: String,
    pub prompt: PromptConfig,
}

/// Caller-side validation companion; the orchestrator assumes it passed.
pub fn validate_write_prompt_request(request: &WritePromptRequest) -> bool {
    !request.table_id.trim().is_empty()
        && !request.prompt.column_name.trim().is_empty()
        && !request.prompt.prompt_text.trim().is_empty()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePromptStatus {
    Created,
    /// Saved, but the confirming column header was never observed.
    Unverified,
}

#[derive(Debug, Clone, Serialize)]
pub struct WritePromptOutcome {
    pub success: bool,
    pub status: WritePromptStatus,
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

fn ai_column_type() -> LocatorCandidates {
    LocatorCandidates::new(
        "AI prompt column type",
        [
            "[data-enrichment-type='ai-prompt']",
            "[data-testid='enrichment-type-ai']",
            "text=AI prompt",
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

fn prompt_editor() -> LocatorCandidates {
    LocatorCandidates::new(
        "prompt editor",
        [
            "[data-testid='prompt-editor']",
            "textarea[name='prompt']",
            ".prompt-editor textarea",
            "[contenteditable='true']",
        ],
    )
}

fn model_select() -> LocatorCandidates {
    LocatorCandidates::new(
        "model select",
        [
            "[data-testid='model-select']",
            "select[name='model']",
            ".model-picker select",
        ],
    )
}

fn output_format_select() -> LocatorCandidates {
    LocatorCandidates::new(
        "output format select",
        [
            "[data-testid='output-format']",
            "select[name='outputFormat']",
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

/// Add an AI prompt column. The prompt editor is the one control this
/// workflow cannot do without; model and output format are optional.
pub async fn write_prompt_column(
    ctx: &WorkflowContext,
    request: &WritePromptRequest,
) -> Result<WritePromptOutcome> {
    let prompt = &request.prompt;
    ctx.log.info(format!(
        "writing AI prompt column '{}' on {}",
        prompt.column_name, request.table_id
    ));

    ensure_table_open(ctx, &request.table_id).await?;
    let prober = ctx.prober();

    if let Err(err) = prober.click(&add_column_control()).await {
        return Err(ctx.fail_with_screenshot(err, "add-column-control-missing").await);
    }
    if let Err(err) = prober.click(&ai_column_type()).await {
        return Err(ctx.fail_with_screenshot(err, "ai-column-type-missing").await);
    }
    if let Err(err) = prober.fill(&name_field(), &prompt.column_name).await {
        return Err(ctx.fail_with_screenshot(err, "column-name-field-missing").await);
    }
    if let Err(err) = prober.fill(&prompt_editor(), &prompt.prompt_text).await {
        return Err(ctx.fail_with_screenshot(err, "prompt-editor-missing").await);
    }

    if let Some(model) = &prompt.model {
        if prober.select_option(&model_select(), model).await.is_err() {
            ctx.log.warn(format!("model control not found; skipping '{model}'"));
        }
    }
    if let Some(format) = &prompt.output_format {
        if prober
            .select_option(&output_format_select(), format)
            .await
            .is_err()
        {
            ctx.log.warn(format!(
                "output format control not found; skipping '{format}'"
            ));
        }
    }

    if let Err(err) = prober.click(&save_control()).await {
        return Err(ctx.fail_with_screenshot(err, "save-column-missing").await);
    }

    let status = match prober.wait_visible(&column_header(&prompt.column_name)).await {
        Ok(_) => {
            ctx.log
                .success(format!("AI prompt column '{}' created", prompt.column_name));
            WritePromptStatus::Created
        }
        Err(_) => {
            ctx.log.warn(format!(
                "could not confirm column '{}' appeared; continuing",
                prompt.column_name
            ));
            WritePromptStatus::Unverified
        }
    };

    Ok(WritePromptOutcome {
        success: true,
        status,
        column_name: prompt.column_name.clone(),
    })
}
