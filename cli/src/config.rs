use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use stride_core::summary_job::DEFAULT_MAX_ATTEMPTS;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub max_attempts: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Optional `config.toml` in the data directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    db_path: Option<PathBuf>,
    job: JobConfig,
}

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub job: JobConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "stride").context("Could not determine home directory")?;
        Self::load_from(proj_dirs.data_dir())
    }

    pub fn load_from(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_path = data_dir.join(CONFIG_FILE);
        let file = if config_path.exists() {
            debug!(path = %config_path.display(), "loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<FileConfig>(&content)
                .with_context(|| format!("Invalid config file {}", config_path.display()))?
        } else {
            FileConfig::default()
        };

        let db_path = file
            .db_path
            .unwrap_or_else(|| data_dir.join("stride.db"));

        Ok(Config {
            db_path,
            data_dir: data_dir.to_path_buf(),
            job: file.job,
        })
    }
}
