//! Radish is a browsing and editing core for Redis key spaces.
//!
//! It exposes the five Redis collection types (string, list, hash, set,
//! sorted set) through one paginated, mask-filterable interface and rebuilds
//! a namespace tree over the flat key space using a delimiter.
//!
//! ## Core Components
//! - [`keys`]: Key type resolution, per-type value providers, pagination,
//!   mask matching and the namespace tree builder.
//! - [`engine`]: An in-memory store implementing [`Connector`].
//! - [`sdk`]: A RESP client implementing [`Connector`] and connector discovery.
//! - [`server`]: A RESP endpoint serving the in-memory store.
//!
//! ## Concurrency
//!
//! Every operation is independent and may run concurrently with any other.
//! Multi-step mutations (hash field rename, set member replace, sorted-set
//! member update, list insert and delete by index) are **not atomic**: a
//! concurrent operation on the same key can interleave between the steps and
//! leave the collection in an intermediate state. This is an accepted
//! limitation, not a contract of correctness.

pub mod command;
pub mod config;
pub mod engine;
pub mod keys;
pub mod sdk;
pub mod server;
pub mod stats;

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub use command::{Command, Reply};
pub use config::Config;
pub use stats::{KeyspaceStat, ServerStat};

/// Errors returned by Radish.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested key does not exist.
    #[error("key {0} doesn't exist")]
    KeyNotFound(String),
    /// The requested page starts beyond the last element.
    #[error("page not found")]
    PageNotFound,
    /// The write would overwrite an existing field, member or key.
    #[error("{0}")]
    Conflict(String),
    /// A value read from the store could not be interpreted.
    #[error("corrupted value: {0}")]
    Corruption(String),
    /// The store reported a type this crate does not handle.
    #[error("unknown object type {0}")]
    UnknownType(String),
    /// No server with the given name is known to the connector.
    #[error("no server with name {0} found")]
    ServerNotFound(String),
    /// The store answered with an error reply.
    #[error("store error: {0}")]
    Store(String),
    /// The store answered with something that is not valid RESP.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The operation was cancelled while waiting on the store.
    #[error("operation cancelled")]
    Cancelled,
    /// A caller-supplied argument is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),
    /// An I/O error occurred during network communication or config loading.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`Error`] for boundary layers that map errors to
/// user-visible responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Corruption,
    Connector,
    Cancelled,
    Invalid,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::KeyNotFound(_) | Error::PageNotFound => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Corruption(_) | Error::UnknownType(_) => ErrorKind::Corruption,
            Error::ServerNotFound(_) | Error::Store(_) | Error::Protocol(_) | Error::Io(_) => {
                ErrorKind::Connector
            }
            Error::Cancelled => ErrorKind::Cancelled,
            Error::InvalidArgument(_)
            | Error::Config(_)
            | Error::Serialization(_)
            | Error::Internal(_) => ErrorKind::Invalid,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// A specialized Result type for Radish operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A live session against one database of one store server.
///
/// Sessions are owned by a single operation and never shared.
#[async_trait]
pub trait Session: Send {
    /// Sends one command and waits for its reply.
    ///
    /// Error replies from the store are returned as [`Error::Store`].
    async fn execute(&mut self, command: &Command) -> Result<Reply>;
}

/// Provides live sessions to store servers.
///
/// Pooling, reconnection and credentials are the implementation's concern.
/// Only [`Connector::session`] and [`Connector::servers`] are required; the
/// statistics methods are answered through a session on database 0.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a session to database `db` of `server`.
    async fn session(&self, server: &str, db: u8) -> Result<Box<dyn Session>>;

    /// Lists the names of the servers this connector can reach.
    fn servers(&self) -> Vec<String>;

    /// Returns the number of databases configured on `server`.
    async fn max_database_count(&self, server: &str) -> Result<u8> {
        let mut session = self.session(server, 0).await?;
        let reply = session
            .execute(&Command::new("CONFIG").arg("GET").arg("databases"))
            .await?;
        let values = reply.into_strings()?;
        let count = values
            .get(1)
            .ok_or_else(|| Error::Protocol("CONFIG GET databases returned no value".to_string()))?;
        count
            .parse::<u8>()
            .map_err(|e| Error::Protocol(format!("invalid databases count {}: {}", count, e)))
    }

    /// Returns per-database key counts, keyed by database name (`db0`, `db1`, ...).
    async fn keyspace_stats(&self, server: &str) -> Result<BTreeMap<String, KeyspaceStat>> {
        let mut session = self.session(server, 0).await?;
        let info = session
            .execute(&Command::new("INFO").arg("keyspace"))
            .await?
            .into_string()?;
        Ok(stats::parse_keyspace_info(&info))
    }

    /// Returns general server statistics.
    async fn server_stats(&self, server: &str) -> Result<ServerStat> {
        let mut session = self.session(server, 0).await?;
        let info = session.execute(&Command::new("INFO")).await?.into_string()?;
        Ok(stats::parse_server_info(&info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::PageNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(Error::KeyNotFound("k".to_string()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::Conflict("x".to_string()).kind(), ErrorKind::Conflict);
        assert_eq!(Error::Corruption("x".to_string()).kind(), ErrorKind::Corruption);
        assert_eq!(Error::Store("x".to_string()).kind(), ErrorKind::Connector);
        assert!(Error::PageNotFound.is_not_found());
        assert!(!Error::Cancelled.is_not_found());
    }
}
