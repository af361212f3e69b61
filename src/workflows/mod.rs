mod add_column;
mod context;
mod export;
mod login;
mod nav;
mod run_enrichment;
mod write_prompt;

pub use add_column::{
    add_enrichment_column, validate_add_column_request, AddColumnOutcome, AddColumnRequest,
    AddColumnStatus, EnrichmentConfig,
};
pub use context::WorkflowContext;
pub use export::{
    export_results, validate_export_request, ExportFormat, ExportOutcome, ExportRequest,
    ExportStatus,
};
pub use login::{login, validate_login_request, LoginOutcome, LoginRequest, LoginStatus};
pub use run_enrichment::{
    run_enrichment, validate_run_enrichment_request, EnrichmentStatus, RunEnrichmentOutcome,
    RunEnrichmentRequest, RunState,
};
pub use write_prompt::{
    validate_write_prompt_request, write_prompt_column, PromptConfig, WritePromptOutcome,
    WritePromptRequest, WritePromptStatus,
};
