use eyre::{
    Context as _,
    Result,
};
use perfserv_monitor_config::Config;
use std::{
    fs::OpenOptions,
    sync::Mutex,
};
use tracing_subscriber::{
    prelude::*,
    EnvFilter,
};

const LOG_FILE: &str = "perfservmon.log";

/// Sends all tracing output to the log file in the data directory; stdout is
/// reserved for the plugin's status line.
pub fn log_init(config: &Config) -> Result<()> {
    let directory = config.data_dir();
    std::fs::create_dir_all(directory).context("Failed to create directory")?;
    let log_path = directory.join(LOG_FILE);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {log_path:?}"))?;

    let default_level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_error::ErrorLayer::default())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .with_filter(filter),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")
}
