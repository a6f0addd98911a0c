//! Config resolution that happens before the subscriber exists.

use std::path::PathBuf;

use nebula_config::{CliArgs, Config, ConfigError};
use tracing::{info, warn};

/// Outcome of resolving the config, kept until logging is up.
#[derive(Debug)]
pub struct Startup {
    pub config: Config,
    /// Directory `config.ron` lives in, when one could be determined.
    pub config_dir: Option<PathBuf>,
    /// Load failure that made us fall back to defaults.
    pub load_error: Option<ConfigError>,
}

impl Startup {
    /// Loads (or creates) the config and applies CLI overrides.
    pub fn resolve(args: &CliArgs) -> Self {
        let config_dir = args.config.clone().or_else(Config::default_dir);
        let (mut config, load_error) = match config_dir.as_deref().map(Config::load_or_create) {
            Some(Ok(config)) => (config, None),
            Some(Err(e)) => (Config::default(), Some(e)),
            None => (Config::default(), None),
        };
        config.apply_cli_overrides(args);
        Self {
            config,
            config_dir,
            load_error,
        }
    }

    /// Where debug builds write their JSON log.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join("logs"))
    }

    /// Reports how the config was obtained. Call once logging is initialised.
    pub fn log_outcome(&self) {
        match (&self.config_dir, &self.load_error) {
            (Some(dir), None) => info!(path = %dir.join("config.ron").display(), "Using config"),
            (Some(dir), Some(e)) => warn!(
                path = %dir.join("config.ron").display(),
                error = %e,
                "Failed to load config, using defaults"
            ),
            (None, _) => warn!("No config directory on this platform, using defaults"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_creates_config_and_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let args = CliArgs {
            config: Some(dir.path().to_path_buf()),
            compress: Some(false),
            ..Default::default()
        };
        let startup = Startup::resolve(&args);
        assert!(startup.load_error.is_none());
        assert!(dir.path().join("config.ron").exists());
        assert!(!startup.config.storage.compress);
        assert_eq!(startup.log_dir(), Some(dir.path().join("logs")));
    }

    #[test]
    fn test_resolve_keeps_load_error_for_later() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{broken").unwrap();
        let args = CliArgs {
            config: Some(dir.path().to_path_buf()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        let startup = Startup::resolve(&args);
        assert!(matches!(startup.load_error, Some(ConfigError::ParseError(_))));
        assert_eq!(startup.config.debug.log_level, "debug");
        assert_eq!(startup.config.storage, Config::default().storage);
    }
}
