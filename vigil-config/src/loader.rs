use std::{
    env, fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::models::Config;

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["vigil.toml", "config/vigil.toml"];

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Loads configuration from an optional TOML file, then applies `VIGIL_*`
/// environment overrides on top.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<Config, ConfigLoadError> {
        let mut config = match self.locate() {
            Some(path) => read_file(&path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    fn locate(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.config_path {
            return Some(explicit.clone());
        }
        DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    }
}

fn read_file(path: &Path) -> Result<Config, ConfigLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
        path: path.to_owned(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
        path: path.to_owned(),
        source,
    })
}

fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigLoadError> {
    if let Some(host) = env_var("VIGIL_SERVER_HOST") {
        config.server.host = host;
    }
    if let Some(port) = env_var("VIGIL_SERVER_PORT") {
        config.server.port = parse_port("VIGIL_SERVER_PORT", &port)?;
    }
    if let Some(port) = env_var("VIGIL_INGEST_PORT") {
        config.ingest.port = parse_port("VIGIL_INGEST_PORT", &port)?;
    }
    if let Some(dir) = env_var("VIGIL_DATA_DIR") {
        config.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(filter) = env_var("VIGIL_LOG") {
        config.log_filter = Some(filter);
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigLoadError> {
    value.parse().map_err(|_| ConfigLoadError::InvalidEnv {
        var,
        value: value.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ConfigLoader::new()
            .with_config_path("/definitely/not/here/vigil.toml");
        // An explicit path that does not exist still goes through read and fails.
        assert!(config.load().is_err());

        let config = ConfigLoader::default();
        // No explicit path and no file in cwd: defaults.
        let loaded = config.load().unwrap();
        assert_eq!(loaded.server.port, 8000);
        assert_eq!(loaded.ingest.port, 8766);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 9000\n\n[ingest]\nport = 9766\n"
        )
        .unwrap();

        let loaded = ConfigLoader::new().with_config_path(&path).load().unwrap();
        assert_eq!(loaded.server.port, 9000);
        assert_eq!(loaded.ingest.port, 9766);
        assert_eq!(loaded.server.host, "127.0.0.1");
    }
}
