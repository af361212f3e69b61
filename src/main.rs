use std::collections::BTreeMap;
use std::sync::Arc;

use clap::{Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

use enrich_pilot::workflows::{
    add_enrichment_column, export_results, login, run_enrichment, validate_add_column_request,
    validate_export_request, validate_login_request, validate_run_enrichment_request,
    validate_write_prompt_request, write_prompt_column, AddColumnRequest, EnrichmentConfig,
    ExportFormat, ExportRequest, LoginRequest, PromptConfig, RunEnrichmentRequest,
    WorkflowContext, WritePromptRequest,
};
use enrich_pilot::{AutomationConfig, Driver, EventLog, SessionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = Command::new("enrich-pilot")
        .about("Drive a table enrichment pipeline through a browser automation backend")
        .arg(
            Arg::new("table")
                .long("table")
                .default_value("tbl_demo")
                .help("Target table id"),
        )
        .arg(
            Arg::new("email")
                .long("email")
                .default_value("demo@example.com"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .default_value("demo-password"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .default_value("https://app.example.com"),
        )
        .arg(
            Arg::new("profile-dir")
                .long("profile-dir")
                .default_value(".enrich-pilot"),
        )
        .arg(
            Arg::new("live")
                .long("live")
                .action(ArgAction::SetTrue)
                .help("Forward operations to a connected driver instead of simulating them"),
        )
        .get_matches();

    let mut config = AutomationConfig::default();
    config.base_url = matches
        .get_one::<String>("base-url")
        .cloned()
        .unwrap_or_default();
    config.profile_dir = matches
        .get_one::<String>("profile-dir")
        .cloned()
        .unwrap_or_default()
        .into();
    config.dry_run = !matches.get_flag("live");
    if config.dry_run {
        // keep the demo snappy; real runs use the full defaults
        config.timeouts.dry_run_delay_ms = 20;
        config.timeouts.settle_ms = 50;
    }
    let table_id = matches.get_one::<String>("table").cloned().unwrap_or_default();

    let log = Arc::new(EventLog::new());
    log.subscribe(|entry| println!("{}", entry.format_line()));

    let driver = Arc::new(Driver::new(config.clone(), log.clone()));
    let sessions = Arc::new(SessionStore::from_config(&config));
    let ctx = WorkflowContext::new(driver, log.clone(), sessions, config);

    if ctx.config.dry_run {
        log.info("dry run: operations are simulated, nothing leaves this process");
    } else if !ctx.driver.is_connected() {
        log.warn("--live without a bound driver handler; operations will fail until the host connects one");
    }

    let login_request = LoginRequest {
        email: matches.get_one::<String>("email").cloned().unwrap_or_default(),
        password: matches
            .get_one::<String>("password")
            .cloned()
            .unwrap_or_default(),
        session_tokens: vec![],
    };
    if !validate_login_request(&login_request) {
        return Err("login request needs an email address and a password".into());
    }
    let signed_in = login(&ctx, &login_request).await?;
    log.info(format!("authenticated as {}", signed_in.identity));

    let add_request = AddColumnRequest {
        table_id: table_id.clone(),
        enrichment: EnrichmentConfig {
            name: "Company size".to_string(),
            enrichment_type: "firmographics".to_string(),
            source_column: Some("Domain".to_string()),
            settings: BTreeMap::from([("region".to_string(), "global".to_string())]),
        },
    };
    if validate_add_column_request(&add_request) {
        let added = add_enrichment_column(&ctx, &add_request).await?;
        log.info(format!("column '{}' status {:?}", added.column_name, added.status));
    }

    let run_request = RunEnrichmentRequest {
        table_id: table_id.clone(),
        columns: None,
        // a dry run has no completion marker to wait for
        wait_for_completion: !ctx.config.dry_run,
    };
    if validate_run_enrichment_request(&run_request) {
        let run = run_enrichment(&ctx, &run_request).await?;
        log.info(format!(
            "enrichment status {:?} after {:.1}s",
            run.status,
            run.elapsed.as_secs_f64()
        ));
    }

    let prompt_request = WritePromptRequest {
        table_id: table_id.clone(),
        prompt: PromptConfig {
            column_name: "Icebreaker".to_string(),
            prompt_text: "Write a one-line opener referencing {{Company}}".to_string(),
            model: None,
            output_format: None,
        },
    };
    if validate_write_prompt_request(&prompt_request) {
        let written = write_prompt_column(&ctx, &prompt_request).await?;
        log.info(format!("prompt column '{}' status {:?}", written.column_name, written.status));
    }

    let export_request = ExportRequest {
        table_id,
        output_path: "exports/results.csv".to_string(),
        format: ExportFormat::Csv,
        include_columns: None,
    };
    if validate_export_request(&export_request) {
        let exported = export_results(&ctx, &export_request).await?;
        log.info(format!(
            "export to {} status {:?}",
            exported.output_path, exported.status
        ));
    }

    ctx.driver.close().await?;
    log.success(format!("pipeline finished; {} log entries", log.entries().len()));
    Ok(())
}
