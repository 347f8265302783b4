//! `arbordb` Query Execution
//!
//! This crate implements the pull-based cursor model and the operators that
//! run over hkey-ordered groups and their indexes.
//!
//! # Overview
//!
//! - **Cursors**: every operator implements [`Cursor`], with an explicit
//!   `Closed`/`Active` lifecycle and a binding scope for re-execution
//! - **Index scans**: [`IndexScan`] over an [`IndexKeyRange`], in any mix
//!   of per-column directions, with `jump` support
//! - **Hierarchy**: [`Flatten`] joins parents to children and
//!   [`AncestorLookup`] fetches ancestors by hkey prefix
//! - **Merging**: [`IntersectOrdered`] with skip-scan
//! - **Ordering**: [`SortGeneral`], [`SortInsertionLimited`] and
//!   [`DistinctPartial`]
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use arbordb_core::catalog::{GroupBuilder, IndexDef};
//! use arbordb_core::{Field, RowOrdering, SortColumn, Value, ValueType};
//! use arbordb_query::{ExecutionContext, Executor, IndexBound, IndexKeyRange, IndexScan};
//! use arbordb_storage::MemoryStore;
//!
//! let group = GroupBuilder::new("t")
//!     .root("t", vec![Field::not_null("id", ValueType::Int), Field::new("a", ValueType::Int)], &["id"])
//!     .build()?;
//! let index = IndexDef::table(&group, "t_a", "t", &["a"])?;
//! let mut store = MemoryStore::new(Arc::clone(&group));
//! store.insert_all([
//!     ("t", vec![Value::Int(1), Value::Int(30)]),
//!     ("t", vec![Value::Int(2), Value::Int(10)]),
//!     ("t", vec![Value::Int(3), Value::Int(20)]),
//! ])?;
//! store.add_index(Arc::clone(&index))?;
//!
//! // Index rows are (a, id); scan a descending from 25.
//! let ordering = RowOrdering::new().then(SortColumn::desc(0)).then(SortColumn::desc(1));
//! let range = IndexKeyRange::ending_at(IndexBound::inclusive([25i64]))?;
//! let scan = IndexScan::new(index, range, ordering)?;
//!
//! let ctx = Arc::new(ExecutionContext::new().with_store(Arc::new(store)));
//! let rows = Executor::new(Box::new(scan), ctx).collect()?;
//! let ids: Vec<_> = rows.iter().map(|r| r.values()[1].clone()).collect();
//! assert_eq!(ids, vec![Value::Int(3), Value::Int(2)]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Deny unwrap in library code to ensure proper error handling
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod exec;

pub use error::{ExecError, ExecResult};
pub use exec::operators::{
    AncestorLookup, BoundExpr, DistinctPartial, Flatten, FlattenOptions, GroupScan, IndexBound, IndexKeyRange,
    IndexScan, InputPreservation, IntersectOptions, IntersectOrdered, JoinType, MapNestedLoops, OutputSide, ScanMode,
    SortGeneral, SortInsertionLimited, SortOption, ValuesScan,
};
pub use exec::{
    BoxedCursor, CancellationToken, ColumnSelector, Cursor, CursorState, ExecutionConfig, ExecutionContext, Executor,
    MultipleBindingsCursor, QueryBindings, QueryBindingsCursor, SingletonBindingsCursor,
};
