//! Query execution.
//!
//! Plans are trees of [`Cursor`]s pulled from the root. The [`Executor`]
//! runs a plan once per bindings set; every cursor shares one
//! [`ExecutionContext`].

pub mod bindings;
pub mod context;
pub mod cursor;
pub mod executor;
pub mod operators;

pub use bindings::{Binding, MultipleBindingsCursor, QueryBindings, QueryBindingsCursor, SingletonBindingsCursor};
pub use context::{CancellationToken, ExecutionConfig, ExecutionContext, ExecutionStats, DEFAULT_MAX_ROWS_IN_MEMORY};
pub use cursor::{BoxedCursor, ColumnSelector, Cursor, CursorBase, CursorState};
pub use executor::Executor;
