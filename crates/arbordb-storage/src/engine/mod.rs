//! Storage traits and error types.
//!
//! - [`GroupStore`] - the group's rows in hkey order, its indexes, and exact lookup
//! - [`StoreCursor`] - ordered, seekable iteration over one of those sequences

mod error;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{CursorResult, GroupStore, SeekMode, SeekTarget, StoreCursor};
