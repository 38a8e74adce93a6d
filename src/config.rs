use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Model directory handed over by the hosting platform.
pub const ENV_MODEL_DIR: &str = "SM_MODEL_DIR";
/// Port the hosting platform expects the server on.
pub const ENV_BIND_PORT: &str = "SAGEMAKER_BIND_TO_PORT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value {value:?} for {name}")]
    InvalidEnv { name: &'static str, value: String },
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_bytes: 6 * 1024 * 1024,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/opt/ml/model"),
            intra_threads: 4,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `tabserve=debug,tower=warn`.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Reads `path` when given; every field has a default, so running
    /// without a file is fine.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_yaml(&raw)
            }
            None => Ok(Self::default()),
        }
    }

    /// Applies platform environment overrides, looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(ENV_MODEL_DIR).filter(|v| !v.is_empty()) {
            self.model.dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup(ENV_BIND_PORT).filter(|v| !v.is_empty()) {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_BIND_PORT,
                value: port.clone(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_without_file() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.model.dir, PathBuf::from("/opt/ml/model"));
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml(
            "server:\n  port: 3000\nmodel:\n  dir: models/pets\nlogging:\n  json: true\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.dir, PathBuf::from("models/pets"));
        assert_eq!(config.model.intra_threads, 4);
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "server:\n  host: 127.0.0.1\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");

        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            AppConfig::from_yaml("server:\n  port: lots\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_MODEL_DIR, "/opt/ml/model/pets"), (ENV_BIND_PORT, "9090")]);
        let mut config = AppConfig::default();
        config
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.model.dir, PathBuf::from("/opt/ml/model/pets"));
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_invalid_port_env() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|name| (name == ENV_BIND_PORT).then(|| "http".to_string()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { name: ENV_BIND_PORT, .. })
        ));
    }
}
