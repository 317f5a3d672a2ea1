//! Configuration loading and database path resolution

use crate::error::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine tunables
///
/// Loaded from the `[stats]` table of the config file; every field has a
/// compiled default so a missing file or table is not an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Lower bound on distribution estimates per semester; the refit
    /// throttle interval is total_changes / this value.
    pub rough_minimum_estimates: usize,

    /// Cache entry lifetime as a fraction of the add/drop period:
    /// timeout = estimated duration / this divisor.
    pub cache_timeout_divisor: i64,
}

impl Default for StatsConfig {
    fn default() -> StatsConfig {
        StatsConfig {
            rough_minimum_estimates: 50,
            cache_timeout_divisor: 25,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    stats: StatsConfig,
    database: Option<PathBuf>,
}

/// Load engine tunables from a config file, falling back to defaults
pub fn load_stats_config(path: Option<&Path>) -> Result<StatsConfig> {
    Ok(read_config_file(path)?.stats)
}

/// Database path resolution, in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. `database` key in the config file
/// 4. Compiled default (`./coursepulse.db`)
pub fn resolve_database_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_path: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    if let Some(path) = read_config_file(config_path)?.database {
        return Ok(path);
    }

    Ok(PathBuf::from("coursepulse.db"))
}

fn read_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from("coursepulse.toml"),
    };
    if !path.exists() {
        return Ok(ConfigFile::default());
    }
    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content)
        .map_err(|e| crate::Error::Config(format!("{}: {e}", path.display())))
}
