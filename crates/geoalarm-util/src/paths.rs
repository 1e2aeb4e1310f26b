//! Default paths for geoalarm components
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/geoalarm/config.toml` or `~/.config/geoalarm/config.toml`
//! - Data: `$XDG_DATA_HOME/geoalarm` or `~/.local/share/geoalarm`
//! - Logs: `$XDG_STATE_HOME/geoalarm` or `~/.local/state/geoalarm`

use std::path::PathBuf;

/// Environment variable for overriding the config file path
pub const GEOALARM_CONFIG_ENV: &str = "GEOALARM_CONFIG";

/// Environment variable for overriding the data directory
pub const GEOALARM_DATA_DIR_ENV: &str = "GEOALARM_DATA_DIR";

/// Application subdirectory name
const APP_DIR: &str = "geoalarm";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "geoalarm.db";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$GEOALARM_CONFIG` environment variable (if set)
/// 2. `$XDG_CONFIG_HOME/geoalarm/config.toml`
/// 3. `~/.config/geoalarm/config.toml` (fallback)
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(GEOALARM_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    xdg_dir("XDG_CONFIG_HOME", &[".config"], "config").join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$GEOALARM_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/geoalarm` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/geoalarm` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(GEOALARM_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the GEOALARM_DATA_DIR env var.
/// Used for default values in configs where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", &[".local", "share"], "data")
}

fn xdg_dir(var: &str, home_relative: &[&str], last_resort: &str) -> PathBuf {
    if let Ok(base) = std::env::var(var) {
        return PathBuf::from(base).join(APP_DIR);
    }

    if let Some(home) = dirs::home_dir() {
        let mut path = home;
        for part in home_relative {
            path.push(part);
        }
        return path.join(APP_DIR);
    }

    // Last resort
    PathBuf::from("/tmp").join(APP_DIR).join(last_resort)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_contains_app_name() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("geoalarm"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
