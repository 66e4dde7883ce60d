//! CLI configuration loading and merging.

use std::path::PathBuf;

use glosa_core::Config;

/// Load and merge CLI configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (handled by clap)
/// 2. Environment variables (and `.env`)
/// 3. Local config file (./.glosarc)
/// 4. Global config file (~/.glosa/config.toml)
/// 5. Defaults
pub fn load_config(data_dir: Option<PathBuf>) -> anyhow::Result<Config> {
    let mut config = Config::load()?;
    if let Some(data_dir) = data_dir {
        config.storage.data_dir = data_dir;
    }
    Ok(config)
}
