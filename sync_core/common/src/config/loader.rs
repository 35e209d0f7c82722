use crate::config::components::global::EngineConfig;
use crate::config::error::ConfigError;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "reconcile.yml";
pub const CONFIG_DIR_ENV: &str = "RECONCILE_CONFIG";

/// Read `reconcile.yml` from `config_dir`, or from the directory named by
/// `RECONCILE_CONFIG`, or from the working directory.
pub fn read_config(config_dir: Option<PathBuf>) -> Result<EngineConfig, ConfigError> {
    let path = config_path(config_dir);
    if !path.exists() {
        return Err(ConfigError::incorrect_path(&path));
    }
    parse_config_file(&path)
}

/// Like [`read_config`] but a missing file yields the defaults.
pub fn load_config_or_default(config_dir: Option<PathBuf>) -> Result<EngineConfig, ConfigError> {
    let path = config_path(config_dir);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no reconcile config found, using defaults");
        return Ok(EngineConfig::default());
    }
    parse_config_file(&path)
}

fn config_path(config_dir: Option<PathBuf>) -> PathBuf {
    let dir = config_dir
        .or_else(|| std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from))
        .unwrap_or_default();
    dir.join(CONFIG_FILE_NAME)
}

fn parse_config_file(path: &Path) -> Result<EngineConfig, ConfigError> {
    tracing::debug!(path = %path.display(), "loading reconcile config");
    let file = fs::File::open(path)?;
    let config: EngineConfig = serde_yaml::from_reader(file)?;
    config.validate()?;
    Ok(config)
}
