//! Unique identifier minting backed by a durable pool

pub mod mint;
pub mod store;

pub use mint::IdentifierMint;
pub use store::{IdentifierStore, JsonFileStore, MemoryStore};
