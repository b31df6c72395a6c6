use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dialoguer::Confirm;
use sparkify_dwh::config::RuntimeConfig;
use sparkify_dwh::provision::{CreateOutcome, Provisioner};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Provision, check and tear down the Sparkify Redshift cluster and IAM role
#[derive(Parser)]
#[command(name = "sparkify-dwh")]
#[command(version)]
#[command(about = "Provision, check and tear down the Sparkify Redshift cluster and IAM role", long_about = None)]
struct Cli {
    /// What to do
    #[arg(value_enum)]
    purpose: Purpose,

    /// Path to the config file (default: $SPARKIFY_DWH_CONFIG or ./dwh.cfg)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Skip the confirmation prompt for clean
    #[arg(short, long)]
    yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Purpose {
    /// Create the IAM role and request the Redshift cluster
    Create,
    /// Show cluster status; once available, write ARN and HOST into the config
    Check,
    /// Delete the cluster, detach the policy and delete the IAM role
    Clean,
}

fn main() -> Result<ExitCode> {
    // Invalid purposes exit here, before any config or provider is touched
    let cli = Cli::parse();

    let mut config =
        RuntimeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    sparkify_dwh::init_tracing(&config.log);

    config
        .validate_for_provisioning()
        .context("Invalid configuration")?;

    if cli.purpose == Purpose::Clean && !cli.yes && !confirm_clean(&config)? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    sparkify_dwh::runtime()
        .context("Failed to build tokio runtime")?
        .block_on(run(cli.purpose, config))
}

fn confirm_clean(config: &RuntimeConfig) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(format!(
            "Delete cluster '{}' (no final snapshot) and IAM role '{}'?",
            config.provision.cluster_identifier, config.provision.role_name
        ))
        .default(false)
        .interact()?)
}

async fn run(purpose: Purpose, config: RuntimeConfig) -> Result<ExitCode> {
    let provisioner = Provisioner::aws(&config).await;

    match purpose {
        Purpose::Create => {
            let report = provisioner
                .run_create(&config.cluster)
                .await
                .context("Failed to provision the IAM role")?;

            println!();
            println!("IAM role:  {} ({})", report.role, report.role_arn);
            println!("Cluster:   {}", report.cluster);
            println!();
            if report.cluster == CreateOutcome::Created {
                println!("Next steps:");
                println!("  Run `sparkify-dwh check` until the status is 'available'.");
                println!();
            }
            Ok(ExitCode::SUCCESS)
        }
        Purpose::Check => {
            let report = provisioner
                .run_check(&config)
                .await
                .context("Failed to check cluster status")?;

            println!();
            match report.synced {
                Some(synced) => {
                    println!("Cluster is available.");
                    println!("  ARN:  {}", synced.role_arn);
                    println!("  HOST: {}", synced.endpoint);
                    println!("Updated {}", config.path.display());
                    println!();
                    println!("Next steps:");
                    println!("  sparkify-etl --reset-tables");
                }
                None => {
                    println!("Cluster status: {}", report.status);
                    info!("Config left unchanged until the cluster is available");
                }
            }
            println!();
            Ok(ExitCode::SUCCESS)
        }
        Purpose::Clean => {
            let report = provisioner.run_clean().await;

            println!();
            for (step, outcome) in report.steps() {
                println!("  {:<18} {}", step, outcome);
            }
            println!();
            if report.has_failures() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}
