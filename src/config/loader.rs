// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{DispatchConfig, RawDispatchConfig};
use crate::errors::Result;

/// Load a configuration file and return the raw, unvalidated form.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to
/// also check retry and coder settings.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawDispatchConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawDispatchConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<DispatchConfig> {
    let raw_config = load_from_path(&path)?;
    let config = DispatchConfig::try_from(raw_config)?;
    Ok(config)
}

/// `JobDispatch.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("JobDispatch.toml")
}
