//! Storage backend implementations.
//!
//! - [`memory`] - snapshot-based in-memory group store

pub mod memory;

pub use memory::{MemoryCursor, MemoryStore};
