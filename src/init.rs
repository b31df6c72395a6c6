// Logging/tracing setup shared by both binaries

use sparkify_dwh_config::{LogConfig, LogFormat};

/// Initialize tracing/logging from the resolved log config.
///
/// `RUST_LOG` wins over the configured level when set. Safe to call more
/// than once; later calls are ignored.
pub fn init_tracing(log: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr; stdout carries the status table and reports
    let _ = match log.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}
