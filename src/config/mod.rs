use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Application configuration, loaded from a TOML file. Every component
/// receives the section it needs as an explicit constructor argument;
/// nothing reads process-wide state.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Event warehouse query API: base URL plus a static bearer token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Code-host API access for repository metadata lookups.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/kudos.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            server: ServerConfig::default(),
            warehouse: WarehouseConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.as_ref().display()))
        })?;
        toml::from_str(&raw).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_minimal_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("kudos.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/kudos.db"

[warehouse]
base_url = "https://events.example.com"
token = "secret"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/kudos.db"));
        assert_eq!(config.warehouse.base_url, "https://events.example.com");
        assert_eq!(config.warehouse.max_retries, 3);
        assert_eq!(config.server.port, 8080);
        assert!(config.github.token.is_empty());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::load("/definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
