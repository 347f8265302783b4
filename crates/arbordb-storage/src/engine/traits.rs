//! Core storage traits.
//!
//! The execution layer reaches storage only through these traits:
//!
//! - [`GroupStore`]: a snapshot of one group, its indexes, and hkey lookup
//! - [`StoreCursor`]: ordered iteration with prefix seeks over one sequence
//!
//! Cursors are owned (`Box<dyn StoreCursor>`) so an operator can hold one
//! across `next()` calls without borrowing the store.

use std::sync::Arc;

use arbordb_core::catalog::{Group, IndexDef};
use arbordb_core::{HKey, Row, Value};

use super::error::StorageResult;

/// Result type for cursor operations that return a row.
pub type CursorResult = StorageResult<Option<Row>>;

/// Where a seek lands relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    /// The first entry at or after the target.
    AtOrAfter,
    /// The first entry strictly after the target.
    After,
    /// The last entry at or before the target.
    AtOrBefore,
    /// The last entry strictly before the target.
    Before,
}

/// What a seek compares against.
#[derive(Debug, Clone, Copy)]
pub enum SeekTarget<'a> {
    /// A key prefix, compared against the leading fields of each entry.
    ///
    /// An entry "equals" the target when its first `len` fields equal it,
    /// so `AtOrBefore` lands on the last entry sharing the prefix.
    Key(&'a [Value]),
    /// An hkey, compared against each entry's hkey.
    HKey(&'a HKey),
}

/// Ordered iteration over a sequence of rows.
///
/// Every positioning method returns the row the cursor lands on, or `None`
/// when it falls off either end.
pub trait StoreCursor: Send {
    /// Positions the cursor relative to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedSeek`](super::StorageError::UnsupportedSeek)
    /// if the sequence is not ordered by the target's kind.
    fn seek(&mut self, target: SeekTarget<'_>, mode: SeekMode) -> CursorResult;

    /// Positions at the first entry.
    fn seek_first(&mut self) -> CursorResult;

    /// Positions at the last entry.
    fn seek_last(&mut self) -> CursorResult;

    /// Moves to the next entry.
    fn next(&mut self) -> CursorResult;

    /// Moves to the previous entry.
    fn prev(&mut self) -> CursorResult;

    /// Returns the entry under the cursor without moving.
    fn current(&self) -> Option<&Row>;
}

/// A readable snapshot of one group.
pub trait GroupStore: Send + Sync {
    /// Returns the group's catalog.
    fn group(&self) -> &Arc<Group>;

    /// Opens a cursor over every row of the group in hkey order.
    fn group_cursor(&self) -> StorageResult<Box<dyn StoreCursor>>;

    /// Opens a cursor over an index's rows in ascending full-key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownIndex`](super::StorageError::UnknownIndex)
    /// if the index was never registered.
    fn index_cursor(&self, index: &IndexDef) -> StorageResult<Box<dyn StoreCursor>>;

    /// Returns the row whose hkey equals `hkey`.
    fn lookup(&self, hkey: &HKey) -> StorageResult<Option<Row>>;
}
