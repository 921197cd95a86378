use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use crate::{Error, Result};

/// Environment variable holding the path of the JSON config file.
pub const CONFIG_ENV: &str = "RADISH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Connection parameters of one store server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
}

impl ServerConfig {
    pub fn new(name: &str, host: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
            password: None,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConfigFile {
    #[serde(default)]
    servers: Vec<ServerConfig>,
    #[serde(default, rename = "URLPrefix")]
    url_prefix: String,
}

/// Process-wide configuration. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub servers: BTreeMap<String, ServerConfig>,
    pub url_prefix: String,
}

impl Config {
    /// Loads the config from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read(path.as_ref())?;
        Self::from_slice(&content)
    }

    /// Loads the config from the file named by `RADISH_CONFIG`, or `config.json`.
    pub fn from_env() -> Result<Self> {
        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }

    pub fn from_slice(content: &[u8]) -> Result<Self> {
        let file: ConfigFile = serde_json::from_slice(content)?;
        let mut servers = BTreeMap::new();
        for server in file.servers {
            if servers.contains_key(&server.name) {
                return Err(Error::Config(format!(
                    "server names should be unique, {} is listed twice",
                    server.name
                )));
            }
            servers.insert(server.name.clone(), server);
        }
        Ok(Self {
            servers,
            url_prefix: file.url_prefix,
        })
    }

    pub fn server(&self, name: &str) -> Result<&ServerConfig> {
        self.servers
            .get(name)
            .ok_or_else(|| Error::ServerNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
  "Servers": [
    {"Name": "server1", "Host": "127.0.0.1", "Port": 6379},
    {"Name": "server2", "Host": "10.0.0.2", "Port": 6380, "Password": "secret"}
  ],
  "URLPrefix": "/radish"
}"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.url_prefix, "/radish");
        assert_eq!(config.server("server1").unwrap().addr(), "127.0.0.1:6379");
        assert_eq!(
            config.server("server2").unwrap().password.as_deref(),
            Some("secret")
        );
    }

    #[test]
    fn test_duplicate_server_names() {
        let json = br#"{"Servers": [
            {"Name": "a", "Host": "h1", "Port": 1},
            {"Name": "a", "Host": "h2", "Port": 2}
        ]}"#;
        assert!(matches!(Config::from_slice(json), Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_server() {
        let config = Config::default();
        assert!(matches!(config.server("nope"), Err(Error::ServerNotFound(_))));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("absent.json")),
            Err(Error::Io(_))
        ));
    }
}
