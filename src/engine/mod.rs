/// In-memory Redis-like store.
pub mod memstore;

pub use memstore::{MemSession, MemStore};
