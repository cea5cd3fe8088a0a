use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stac_validate::cli::{Cli, Commands, ValidateArgs};
use stac_validate::config::{Config, ConfigManager};
use stac_validate::fetcher::Fetcher;
use stac_validate::output::{Output, info_json};
use stac_validate::schema_engine::SchemaEngine;
use stac_validate::schema_store::SchemaStore;
use stac_validate::validator::ValidationEngine;

const EXIT_INVALID: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match cli.command {
        Commands::Info => match serde_json::to_string_pretty(&info_json()) {
            Ok(info) => {
                println!("{}", info);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::from(EXIT_CONFIG)
            }
        },
        Commands::Validate(args) => {
            init_tracing(args.verbose);
            validate(args).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn validate(args: ValidateArgs) -> ExitCode {
    let config = match ConfigManager::load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let engine = match build_engine(&config).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let report = engine.run(&args.target, &args.mode()).await;
    let output = Output::new(config.output.verbose);

    if let Err(e) = emit_report(&output, &config, &report).await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(EXIT_CONFIG);
    }

    if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INVALID)
    }
}

async fn build_engine(config: &Config) -> anyhow::Result<ValidationEngine> {
    let store = match &config.schemas.directory {
        Some(dir) => SchemaStore::from_dir(dir)
            .await
            .with_context(|| format!("Failed to load schemas from {}", dir.display()))?,
        None => SchemaStore::empty(),
    };

    let fetcher = Arc::new(
        Fetcher::new(
            ConfigManager::http_client_config(config),
            ConfigManager::retry_policy(config),
            &ConfigManager::cache_config(config),
        )
        .context("Failed to create fetcher")?,
    );
    let schemas = Arc::new(SchemaEngine::new(
        Arc::new(store),
        Arc::clone(&fetcher),
        config.cache.max_compiled_schemas,
    ));

    Ok(ValidationEngine::new(
        fetcher,
        schemas,
        ConfigManager::validation_config(config),
    ))
}

async fn emit_report(
    output: &Output,
    config: &Config,
    report: &stac_validate::report::ValidationReport,
) -> anyhow::Result<()> {
    if !config.output.no_output {
        println!("{}", output.format_records(&report.records)?);
    }

    if let Some(log_file) = &config.output.log_file {
        output
            .write_log_file(log_file, &report.records)
            .await
            .with_context(|| format!("Failed to write log file {}", log_file.display()))?;
    }

    if config.output.verbose {
        eprintln!("{}", output.format_summary(report));
    }

    Ok(())
}
