/// TCP server exposing the in-memory store.
///
/// This module provides the [`Router`] which accepts RESP connections and
/// runs their commands against a [`crate::engine::MemStore`].
pub mod router;

pub use router::{handle_connection, Router};
