//! pg-provision - PostgreSQL HBA and client-trust provisioning step

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use pg_provision::{
    cli::{Cli, Command},
    config::ProvisionConfig,
    exec::SystemExecutor,
    provision::{ProvisionContext, RunOutcome, StepRunner},
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let executor = SystemExecutor;
    let ctx = ProvisionContext {
        config: &config,
        executor: &executor,
    };
    let runner = StepRunner::standard();

    match cli.command {
        Some(Command::Check) => run_check(&runner, &ctx).await,
        Some(Command::Run { json, strict }) => run_full(&runner, &ctx, json, strict).await,
        None => run_full(&runner, &ctx, false, false).await,
    }
}

/// Load configuration and apply CLI overrides
fn load_config(cli: &Cli) -> pg_provision::Result<ProvisionConfig> {
    let mut config = ProvisionConfig::load(cli.config.as_deref())?;

    if let Some(ref version) = cli.pg_version {
        config.cluster.version = version.clone();
    }
    if let Some(ref instance) = cli.instance {
        config.cluster.instance = instance.clone();
    }
    if let Some(ref key) = cli.ca_key {
        config.ca.key = key.clone();
    }
    if let Some(ref cert) = cli.ca_cert {
        config.ca.cert = cert.clone();
    }

    Ok(config)
}

/// Precondition check only
async fn run_check(runner: &StepRunner, ctx: &ProvisionContext<'_>) -> ExitCode {
    match runner.check(ctx).await {
        Ok(None) => {
            println!("ready");
            ExitCode::SUCCESS
        }
        Ok(Some(step)) => {
            println!("not ready: {step}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Precondition check failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Full provisioning lifecycle
async fn run_full(
    runner: &StepRunner,
    ctx: &ProvisionContext<'_>,
    json: bool,
    strict: bool,
) -> ExitCode {
    info!(
        version = %ctx.config.cluster.version,
        instance = %ctx.config.cluster.instance,
        "starting provisioning run"
    );

    let report = match runner.run(ctx).await {
        Ok(report) => report,
        Err(e) => {
            error!("Provisioning failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                error!("Failed to serialize run report: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    match report.outcome {
        RunOutcome::Completed => ExitCode::SUCCESS,
        RunOutcome::Deferred(step) => {
            warn!(step, "host not ready, nothing was changed");
            if strict {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
    }
}
