//! stackset-sync CLI entrypoint.
//!
//! This is the main entrypoint for the stackset-sync command-line tool.

use std::process::ExitCode;
use std::sync::Arc;

use stackset_sync::cli::{Cli, Commands, LogFormat, OutputFormatter, Settings};
use stackset_sync::config::{AccountConfig, ConfigValidator, DeployableUnit};
use stackset_sync::error::Result;
use stackset_sync::provisioner::{CloudFormationApi, ProvisioningApi, RateLimitedClient};
use stackset_sync::reconciler::Reconciler;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Main async entry point. Returns whether every operation succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);
    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(&settings, warnings, &formatter),
        Commands::Plan => cmd_plan(&settings, &formatter).await,
        Commands::Apply => cmd_apply(&settings, &formatter).await,
    }
}

/// Validate configuration and templates.
fn cmd_validate(settings: &Settings, show_warnings: bool, formatter: &OutputFormatter) -> Result<bool> {
    info!("Validating configuration: {}", settings.config_file.display());

    let (config, units) = load_inputs(settings)?;
    let result = ConfigValidator::new().check(&config, &units);

    eprintln!("{}", formatter.format_validation(&result, &units, show_warnings));
    Ok(result.is_valid())
}

/// Show what a run would change.
async fn cmd_plan(settings: &Settings, formatter: &OutputFormatter) -> Result<bool> {
    let (config, units) = load_validated_inputs(settings)?;
    let reconciler = create_reconciler(settings, config).await;

    let plan = reconciler.plan(&units).await?;

    eprintln!("{}", formatter.format_plan(&plan));
    Ok(true)
}

/// Reconcile every stack set.
async fn cmd_apply(settings: &Settings, formatter: &OutputFormatter) -> Result<bool> {
    let (config, units) = load_validated_inputs(settings)?;
    let reconciler = create_reconciler(settings, config).await;

    let result = reconciler.reconcile(&units).await?;

    for failed in result.failed_operations() {
        warn!(
            "Operation {} on {} ended {}",
            failed.operation, failed.unit, failed.status
        );
    }

    eprintln!("{}", formatter.format_result(&result));
    Ok(result.success())
}

/// Loads the account map and discovers the templates.
fn load_inputs(settings: &Settings) -> Result<(AccountConfig, Vec<DeployableUnit>)> {
    let config = settings.load_config()?;
    let units = settings.template_source().discover()?;
    Ok((config, units))
}

/// Loads inputs and rejects invalid ones, logging warnings.
fn load_validated_inputs(settings: &Settings) -> Result<(AccountConfig, Vec<DeployableUnit>)> {
    let (config, units) = load_inputs(settings)?;

    let result = ConfigValidator::new().validate(&config, &units)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok((config, units))
}

/// Creates a reconciler backed by CloudFormation.
async fn create_reconciler(settings: &Settings, config: AccountConfig) -> Reconciler {
    info!("Using stack set control region: {}", settings.region);
    let api: Arc<dyn ProvisioningApi> = Arc::new(CloudFormationApi::new(Some(&settings.region)).await);
    Reconciler::new(RateLimitedClient::new(api), config)
}
