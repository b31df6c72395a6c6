use anyhow::{Context, Result};
use clap::Parser;
use sparkify_dwh::config::RuntimeConfig;
use sparkify_dwh::loader::{self, Catalog, ConnectionSettings, RedshiftWarehouse};
use std::path::PathBuf;
use tracing::{info, warn};

/// Load S3 data into staging tables and transform it into the star schema
#[derive(Parser)]
#[command(name = "sparkify-etl")]
#[command(version)]
#[command(about = "Load S3 data into staging tables and transform it into the star schema", long_about = None)]
struct Cli {
    /// Path to the config file (default: $SPARKIFY_DWH_CONFIG or ./dwh.cfg)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Query catalog (TOML); defaults to the built-in Sparkify catalog
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Drop and recreate all tables before loading
    #[arg(long)]
    reset_tables: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        RuntimeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.log.level = level.clone();
    }
    sparkify_dwh::init_tracing(&config.log);

    config
        .validate_for_loading()
        .context("Invalid configuration")?;

    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => Catalog::builtin().context("Built-in catalog is invalid")?,
    };
    let catalog = catalog
        .render(&loader::template_vars(&config.cluster))
        .context("Failed to render catalog")?;

    let settings = ConnectionSettings::from_config(&config.cluster)?;

    sparkify_dwh::runtime()
        .context("Failed to build tokio runtime")?
        .block_on(run(settings, catalog, cli.reset_tables))
}

async fn run(settings: ConnectionSettings, catalog: Catalog, reset: bool) -> Result<()> {
    let mut warehouse = RedshiftWarehouse::connect(&settings).await?;

    let result = loader::run_etl(&mut warehouse, &catalog, reset).await;

    if let Err(e) = warehouse.close().await {
        warn!("Failed to close warehouse connection cleanly: {}", e);
    }

    let report = result.context("Warehouse load failed")?;
    info!(
        dropped = report.dropped,
        created = report.created,
        staged = report.staged,
        transformed = report.transformed,
        "Load complete"
    );
    println!(
        "Loaded {} staging and {} transform statements",
        report.staged, report.transformed
    );
    Ok(())
}
