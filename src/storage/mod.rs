// src/storage/mod.rs
//! Persistence for browsing history and the block-list

pub mod history;
pub mod policy_store;

pub use history::{HistoryEntry, HistoryStore, MemoryHistoryStore, SqliteHistoryStore};
pub use policy_store::{JsonPolicyStore, MemoryPolicyStore, PolicyStore};
