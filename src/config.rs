use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::optimizer::CLARABEL;

pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "WHOBS__";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    #[serde(default)]
    #[validate(nested)]
    pub solver: SolverConfig,
    #[serde(default)]
    #[validate(nested)]
    pub jobs: JobsConfig,
    #[validate(nested)]
    pub data: DataConfig,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SolverConfig {
    #[validate(length(min = 1))]
    pub name: String,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self { name: CLARABEL.to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct JobsConfig {
    #[validate(range(min = 1, max = 64))]
    pub workers: usize,
    #[validate(range(min = 1))]
    pub queue_capacity: usize,
    /// Terminal jobs kept in memory for pollers.
    #[validate(range(min = 1))]
    pub finished_job_capacity: usize,
    pub results_dir: PathBuf,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            queue_capacity: 64,
            finished_job_capacity: 256,
            results_dir: PathBuf::from("results-solve"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DataConfig {
    pub solar_path: PathBuf,
    pub wind_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// `path` overlaid with `WHOBS__` environment variables.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract().context("reading configuration")?;
        cfg.validate().context("invalid configuration")?;
        Ok(cfg)
    }
}
