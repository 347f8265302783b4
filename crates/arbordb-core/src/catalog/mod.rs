//! A read-only schema catalog: groups, tables and indexes.
//!
//! - [`GroupBuilder`] declares tables and their grouping foreign keys and
//!   assigns depth-first ordinals.
//! - [`IndexDef`] computes an index's [`IndexRowComposition`] and
//!   [`IndexToHKey`] once, at definition time.

mod group;
mod index;

pub use group::{ColumnRef, Group, GroupBuilder, HKeyComponent, TableDef};
pub use index::{CompositionField, GroupIndexJoin, IndexDef, IndexKind, IndexRowComposition, IndexToHKey};
