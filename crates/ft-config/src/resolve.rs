//! Configuration resolution and path discovery.
//!
//! Resolution order: CLI argument → environment variables → XDG paths → system → defaults.

use std::path::{Path, PathBuf};

use crate::trainer::TrainerConfig;
use crate::validate::{validate_trainer, ValidationResult};

/// Discovered configuration file path.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Path to trainer.json (or None if not found).
    pub trainer: Option<PathBuf>,

    /// Where the trainer config came from (for diagnostics).
    pub trainer_source: ConfigSource,
}

/// Where a configuration file was found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,

    /// Set via environment variable.
    Environment,

    /// Found in XDG config directory.
    XdgConfig,

    /// Found in /etc/frame-tally/.
    SystemConfig,

    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Environment variable names.
pub const ENV_CONFIG_PATH: &str = "FRAME_TALLY_CONFIG";
pub const ENV_CONFIG_DIR: &str = "FRAME_TALLY_CONFIG_DIR";

/// Standard config file name.
const TRAINER_FILENAME: &str = "trainer.json";

/// Application name for XDG directories.
const APP_NAME: &str = "frame-tally";

/// Resolve the trainer config path.
///
/// 1. Explicit CLI path (if it exists)
/// 2. FRAME_TALLY_CONFIG
/// 3. FRAME_TALLY_CONFIG_DIR + trainer.json
/// 4. XDG config directory (~/.config/frame-tally/)
/// 5. System config (/etc/frame-tally/)
/// 6. Built-in defaults (None)
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigPaths {
    let (trainer, trainer_source) = resolve_single_config(cli_path);
    ConfigPaths {
        trainer,
        trainer_source,
    }
}

fn resolve_single_config(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    if let Some(path) = cli_path {
        if path.exists() {
            return (Some(path.to_path_buf()), ConfigSource::CliArgument);
        }
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Ok(config_dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(TRAINER_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Some(dir) = xdg_config_dir() {
        let path = dir.join(TRAINER_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    let system_path = system_config_dir().join(TRAINER_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    (None, ConfigSource::BuiltinDefault)
}

/// Resolve, load and validate the trainer config.
///
/// Falls back to [`TrainerConfig::default`] when no file is found. A file that
/// exists but fails to parse or validate is an error, never silently replaced.
pub fn load_config(cli_path: Option<&Path>) -> ValidationResult<(TrainerConfig, ConfigSource)> {
    let paths = resolve_config(cli_path);
    let cfg = match &paths.trainer {
        Some(path) => TrainerConfig::from_file(path)?,
        None => TrainerConfig::default(),
    };
    validate_trainer(&cfg)?;
    Ok((cfg, paths.trainer_source))
}

/// Get the XDG config directory for frame-tally.
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the system config directory.
pub fn system_config_dir() -> PathBuf {
    PathBuf::from("/etc").join(APP_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_source_display() {
        assert_eq!(format!("{}", ConfigSource::CliArgument), "CLI argument");
        assert_eq!(
            format!("{}", ConfigSource::Environment),
            "environment variable"
        );
        assert_eq!(format!("{}", ConfigSource::XdgConfig), "XDG config");
        assert_eq!(format!("{}", ConfigSource::SystemConfig), "system config");
        assert_eq!(
            format!("{}", ConfigSource::BuiltinDefault),
            "builtin default"
        );
    }

    #[test]
    fn test_xdg_config_dir() {
        if let Some(path) = xdg_config_dir() {
            assert!(path.ends_with(APP_NAME));
        }
    }

    #[test]
    fn test_system_config_dir() {
        assert_eq!(system_config_dir(), PathBuf::from("/etc/frame-tally"));
    }
}
