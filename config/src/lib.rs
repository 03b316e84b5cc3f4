#[macro_use]
extern crate tracing;

mod app_config;
mod args;
mod cell_files;

use app_config::AppConfig;
pub use app_config::{
    get_config_dir,
    get_data_dir,
};
pub use args::{
    Args,
    Command,
    Protocol,
    RetrieveArgs,
    ShowArgs,
};
pub use cell_files::CellFiles;
use serde::Deserialize;
use std::{
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};

const DEFAULT_CONFIG: &str = include_str!("default-config.yaml");

/// Runtime settings, layered from the embedded defaults, the optional
/// `config.yaml` in the config directory and the command line.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    app_config: AppConfig,
    /// Where cell snapshots, stores and markers live.
    pub runtime_dir: PathBuf,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub verbose: bool,
}

impl Config {
    pub fn new(args: Args) -> Result<Self, config::ConfigError> {
        Self::with_dirs(args, &get_data_dir(), &get_config_dir())
    }

    fn with_dirs(args: Args, data_dir: &Path, config_dir: &Path) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.display().to_string())?
            .set_default("config_dir", config_dir.display().to_string())?
            .set_default("runtime_dir", data_dir.display().to_string())?
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Yaml));

        let config_files = [("config.yaml", config::FileFormat::Yaml)];

        for (file, format) in &config_files {
            let source = config::File::from(config_dir.join(file))
                .format(*format)
                .required(false);
            builder = builder.add_source(source);
        }

        builder = builder.add_source(args);

        let cfg: Self = builder.build()?.try_deserialize()?;
        debug!(runtime_dir = ?cfg.runtime_dir, "Loaded configuration");

        Ok(cfg)
    }

    pub fn cell_files(&self, cell: &str) -> CellFiles {
        CellFiles::new(&self.runtime_dir, cell)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn data_dir(&self) -> &Path {
        &self.app_config.data_dir
    }

    pub fn config_dir(&self) -> &Path {
        &self.app_config.config_dir
    }
}
