/// Software Development Kit (SDK) for Radish.
///
/// This module provides the RESP client connector, the wire framing it
/// shares with the server, and connector discovery from configuration.
pub mod client;
/// Connector selection from configuration.
pub mod discovery;
pub mod resp;

pub use client::{RespConnector, RespSession};
pub use discovery::{connect, connect_from_env, EMBEDDED_SERVER};
