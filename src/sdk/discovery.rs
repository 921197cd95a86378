use std::sync::Arc;
use crate::engine::MemStore;
use crate::sdk::RespConnector;
use crate::{Config, Connector, Error, Result};

/// Name of the single server of the embedded store.
pub const EMBEDDED_SERVER: &str = "local";
const EMBEDDED_DATABASES: u8 = 16;

/// Builds a [`Connector`] for `config`.
///
/// 1. When servers are configured, returns a [`RespConnector`] reaching them
///    in **Remote Mode**.
/// 2. Otherwise returns an empty [`MemStore`] with a single server named
///    `local` in **Embedded Mode**.
///
/// # Examples
///
/// ```no_run
/// use radish::{sdk, Config};
///
/// let config = Config::from_env()?;
/// let connector = sdk::connect(&config);
/// # Ok::<(), radish::Error>(())
/// ```
pub fn connect(config: &Config) -> Arc<dyn Connector> {
    if config.servers.is_empty() {
        log::info!("no servers configured, using an embedded store");
        return Arc::new(MemStore::with_servers(&[EMBEDDED_SERVER], EMBEDDED_DATABASES));
    }
    log::info!("connecting to {} configured server(s)", config.servers.len());
    Arc::new(RespConnector::new(config))
}

/// Loads the config named by `RADISH_CONFIG` (or `config.json`) and connects.
/// A missing config file falls back to the embedded store.
pub fn connect_from_env() -> Result<Arc<dyn Connector>> {
    match Config::from_env() {
        Ok(config) => Ok(connect(&config)),
        Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("config file not found, using an embedded store");
            Ok(connect(&Config::default()))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_embedded_without_servers() {
        let connector = connect(&Config::default());
        assert_eq!(connector.servers(), vec![EMBEDDED_SERVER]);
    }

    #[test]
    fn test_remote_with_servers() {
        let mut config = Config::default();
        config
            .servers
            .insert("main".to_string(), ServerConfig::new("main", "127.0.0.1", 6379));
        let connector = connect(&config);
        assert_eq!(connector.servers(), vec!["main"]);
    }
}
