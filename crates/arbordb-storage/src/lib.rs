//! `arbordb` Storage
//!
//! This crate defines the boundary between the execution operators and the
//! ordered key-value layer, plus an in-memory backend.
//!
//! # Overview
//!
//! A group's rows are stored interleaved in hkey order, so a parent is
//! immediately followed by its subtree. Indexes are separate ordered
//! sequences of index rows. The execution layer only needs ordered
//! iteration, prefix seeks, and exact hkey lookup.
//!
//! # Core Traits
//!
//! - [`GroupStore`] - snapshot access to a group and its indexes
//! - [`StoreCursor`] - ordered iteration with [`SeekMode`] seeks
//!
//! # Error Handling
//!
//! All storage operations return [`StorageResult<T>`], an alias for
//! `Result<T, StorageError>`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use arbordb_core::catalog::GroupBuilder;
//! use arbordb_core::{Field, Value, ValueType};
//! use arbordb_storage::{GroupStore, MemoryStore};
//!
//! let group = GroupBuilder::new("g")
//!     .root("parent", vec![Field::not_null("pid", ValueType::Int)], &["pid"])
//!     .child("child", "parent", vec![Field::not_null("cid", ValueType::Int), Field::new("pid", ValueType::Int)], &["cid"], &["pid"])
//!     .build()?;
//! let mut store = MemoryStore::new(Arc::clone(&group));
//! store.insert("child", vec![Value::Int(10), Value::Int(1)])?;
//! store.insert("parent", vec![Value::Int(1)])?;
//!
//! let mut cursor = store.group_cursor()?;
//! assert_eq!(cursor.next()?.map(|r| r.row_type().name().to_owned()), Some("parent".to_owned()));
//! assert_eq!(cursor.next()?.map(|r| r.row_type().name().to_owned()), Some("child".to_owned()));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Modules
//!
//! - [`engine`] - Storage traits and error types
//! - [`backends`] - Concrete storage backends

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]

pub mod backends;
pub mod engine;

pub use backends::{MemoryCursor, MemoryStore};
pub use engine::{CursorResult, GroupStore, SeekMode, SeekTarget, StorageError, StorageResult, StoreCursor};
