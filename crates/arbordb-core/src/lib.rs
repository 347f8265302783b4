//! `arbordb` Core
//!
//! This crate provides the data model shared by the storage layer and the
//! execution operators.
//!
//! # Overview
//!
//! - **Values**: [`Value`] with a total, null-low [`compare_values`]
//! - **Hierarchical keys**: [`HKey`], whose order is document order within a group
//! - **Rows**: immutable [`Row`] snapshots tagged with a [`RowType`]
//! - **Catalog**: [`catalog::Group`], [`catalog::IndexDef`] and their hkey mappings
//! - **Orderings**: [`RowOrdering`], [`SortColumn`] and the [`Comparator`] enum
//!
//! # Example
//!
//! ```
//! use arbordb_core::{HKey, Value};
//!
//! let customer = HKey::root(1, vec![Value::Int(1)]);
//! let order = customer.extend(2, vec![Value::Int(10)]);
//! let next_customer = HKey::root(1, vec![Value::Int(2)]);
//!
//! assert!(customer < order);
//! assert!(order < next_customer);
//! assert!(customer.is_ancestor_of(&order));
//! ```

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod catalog;
pub mod error;
pub mod ordering;
pub mod types;

pub use error::{CoreError, CoreResult};
pub use ordering::{
    CaseInsensitive, CollationProvider, Comparator, DefaultCollations, Direction, NullOrdering, RowOrdering,
    SortColumn, ValueComparator,
};
pub use types::{compare_value_slices, compare_values, Field, HKey, HKeySegment, Row, RowKind, RowOverlay, RowType, Value, ValueType};
