//! Locating and loading the RON configuration file.

use std::path::{Path, PathBuf};

use mailroute_common::tracing;
use mailroute_discovery::DiscoveryConfig;

/// Environment variable naming the configuration file.
pub const CONFIG_VAR: &str = "MAILROUTE_CONFIG";

/// Paths searched, in order, when no path is given explicitly.
pub const DEFAULT_PATHS: [&str; 2] = [
    "./mailroute.config.ron",
    "/etc/mailroute/mailroute.config.ron",
];

/// Find the configuration file using the following precedence:
/// 1. `explicit`, from the command line
/// 2. `MAILROUTE_CONFIG` environment variable
/// 3. ./mailroute.config.ron (current working directory)
/// 4. /etc/mailroute/mailroute.config.ron (system-wide config)
///
/// Returns `Ok(None)` when nothing was named and no default path exists.
///
/// # Errors
///
/// Returns an error if an explicitly named file does not exist.
pub fn find_config_file(
    explicit: Option<&Path>,
    env_path: Option<&str>,
    default_paths: &[&str],
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("Config file does not exist: {}", path.display());
    }

    if let Some(env_path) = env_path {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(Some(path));
        }
        anyhow::bail!(
            "{CONFIG_VAR} points to non-existent file: {}",
            path.display()
        );
    }

    Ok(default_paths
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists()))
}

/// Reads and parses the configuration file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid RON.
pub fn read_config(path: &Path) -> anyhow::Result<DiscoveryConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
    })?;

    ron::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
}

/// Loads the configuration, falling back to defaults when no file is found.
///
/// # Errors
///
/// Returns an error if a named file is missing, unreadable or invalid.
pub fn load(explicit: Option<&Path>) -> anyhow::Result<DiscoveryConfig> {
    let env_path = std::env::var(CONFIG_VAR).ok();

    match find_config_file(explicit, env_path.as_deref(), &DEFAULT_PATHS)? {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            read_config(&path)
        }
        None => {
            tracing::info!("No configuration file found, using defaults");
            Ok(DiscoveryConfig::default())
        }
    }
}
