//! Common utilities shared across CLI commands.

use std::path::{Path, PathBuf};

use kioskplay::config::{config_file_path, ConfigError, ConfigFile};

use crate::error::CliError;

/// Config path from `--config`, or the default location.
pub fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path.unwrap_or_else(config_file_path)
}

/// Loads the config file, pointing at `init` when it does not exist.
pub fn load_config(path: &Path) -> Result<ConfigFile, CliError> {
    match ConfigFile::load_from(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => Err(CliError::Config(format!(
            "No configuration at {}. Run 'kioskplay init <manifest-url>' first.",
            path.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Formats a byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}
