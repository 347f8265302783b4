//! Cursor trait and lifecycle base.
//!
//! Every operator is a [`Cursor`]. A cursor is either [`CursorState::Closed`]
//! or [`CursorState::Active`], and all transitions go through the trait's
//! methods:
//!
//! 1. `open_bindings(ctx)` enters a binding scope and hands the cursor the
//!    shared [`ExecutionContext`].
//! 2. `next_bindings(bindings)` installs the parameters for one execution.
//! 3. `open()` starts the stream; `next()` pulls rows; returning `None`
//!    closes the cursor; `close()` stops early.
//! 4. Steps 2 and 3 repeat for each execution; `close_bindings()` ends the
//!    scope.
//!
//! Calls outside their legal state fail with
//! [`ExecError::CursorState`] and leave the cursor closed.

use std::sync::Arc;

use arbordb_core::{Row, RowType};
use tracing::{debug, trace};

use super::bindings::QueryBindings;
use super::context::ExecutionContext;
use crate::error::{ExecError, ExecResult};

/// The lifecycle state of a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorState {
    /// Not producing rows. Initial and terminal state.
    #[default]
    Closed,
    /// Open and producing rows.
    Active,
}

impl CursorState {
    /// Returns true if the cursor is active.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true if the cursor is closed.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Which leading fields of a jump target take part in the jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSelector {
    /// Every field.
    All,
    /// The first `n` fields.
    Prefix(usize),
}

impl ColumnSelector {
    /// Returns the number of selected fields of a row with `arity` fields.
    #[must_use]
    pub fn width(self, arity: usize) -> usize {
        match self {
            Self::All => arity,
            Self::Prefix(n) => n.min(arity),
        }
    }
}

/// The cursor trait for pull-based execution.
///
/// Cursors form a tree matching the plan. `open_bindings`, `next_bindings`
/// and `close_bindings` recurse into children; whether `open` and `close`
/// do depends on the operator.
///
/// # Thread Safety
///
/// Cursors are `Send` so a plan can move between threads, but not `Sync`:
/// they hold mutable position state and are never shared.
pub trait Cursor: Send {
    /// Enters a binding scope.
    fn open_bindings(&mut self, ctx: &Arc<ExecutionContext>) -> ExecResult<()>;

    /// Installs the bindings for the next execution.
    ///
    /// # Errors
    ///
    /// Fails with a state error while the cursor is active.
    fn next_bindings(&mut self, bindings: Arc<QueryBindings>) -> ExecResult<()>;

    /// Closes the cursor if needed and leaves the binding scope.
    fn close_bindings(&mut self) -> ExecResult<()>;

    /// Starts a new execution from the beginning of the stream.
    ///
    /// # Errors
    ///
    /// Fails with a state error if the cursor is already active (the cursor
    /// is closed first) or if no bindings are installed.
    fn open(&mut self) -> ExecResult<()>;

    /// Returns the next row, or `None` at the end of the stream.
    ///
    /// Returning `None` closes the cursor.
    ///
    /// # Errors
    ///
    /// Fails with a state error if the cursor is closed.
    fn next(&mut self) -> ExecResult<Option<Row>>;

    /// Repositions the cursor so the next row is the first one at or after
    /// `target` on the selected leading fields, in the cursor's order.
    ///
    /// # Errors
    ///
    /// Fails with a state error if the cursor is closed, and with
    /// [`ExecError::Unsupported`] if the operator cannot reposition.
    fn jump(&mut self, target: &Row, selector: ColumnSelector) -> ExecResult<()> {
        let _ = (target, selector);
        if self.state().is_closed() {
            return Err(ExecError::cursor_state(self.name(), "jump() on a closed cursor"));
        }
        Err(ExecError::Unsupported(format!("{} does not support jump", self.name())))
    }

    /// Stops the stream and releases resources. A no-op when closed.
    fn close(&mut self) -> ExecResult<()>;

    /// Returns the lifecycle state.
    fn state(&self) -> CursorState;

    /// Returns the type of the rows this cursor produces.
    fn row_type(&self) -> Arc<RowType>;

    /// Returns the name of this operator type.
    fn name(&self) -> &'static str;

    /// Opens a plan root: enters the binding scope with one empty bindings
    /// set and opens the cursor.
    fn open_top_level(&mut self, ctx: &Arc<ExecutionContext>) -> ExecResult<()> {
        self.open_bindings(ctx)?;
        self.next_bindings(Arc::new(QueryBindings::new()))?;
        self.open()
    }

    /// Closes a plan root opened with [`open_top_level`](Self::open_top_level).
    fn close_top_level(&mut self) -> ExecResult<()> {
        self.close()?;
        self.close_bindings()
    }
}

/// A boxed cursor for dynamic dispatch.
pub type BoxedCursor = Box<dyn Cursor>;

/// Pulls from `input` unless it has already closed itself.
pub(crate) fn pull(input: &mut BoxedCursor) -> ExecResult<Option<Row>> {
    if input.state().is_closed() {
        Ok(None)
    } else {
        input.next()
    }
}

/// Lifecycle bookkeeping shared by every operator.
#[derive(Debug)]
pub struct CursorBase {
    /// The operator name, used in errors and logs.
    name: &'static str,
    /// The output row type.
    row_type: Arc<RowType>,
    /// The current state.
    state: CursorState,
    /// The context of the current binding scope.
    ctx: Option<Arc<ExecutionContext>>,
    /// The bindings of the current execution.
    bindings: Option<Arc<QueryBindings>>,
    /// Number of rows produced in the current execution.
    rows_produced: u64,
}

impl CursorBase {
    /// Creates a closed base with no binding scope.
    #[must_use]
    pub fn new(name: &'static str, row_type: Arc<RowType>) -> Self {
        Self { name, row_type, state: CursorState::Closed, ctx: None, bindings: None, rows_produced: 0 }
    }

    /// Returns the operator name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the output row type.
    #[must_use]
    pub fn row_type(&self) -> Arc<RowType> {
        Arc::clone(&self.row_type)
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> CursorState {
        self.state
    }

    /// Returns the number of rows produced since the last open.
    #[must_use]
    pub const fn rows_produced(&self) -> u64 {
        self.rows_produced
    }

    /// Enters a binding scope.
    pub fn open_bindings(&mut self, ctx: &Arc<ExecutionContext>) {
        self.ctx = Some(Arc::clone(ctx));
        self.bindings = None;
    }

    /// Installs bindings for the next execution.
    pub fn next_bindings(&mut self, bindings: Arc<QueryBindings>) -> ExecResult<()> {
        if self.state.is_active() {
            return Err(self.state_error("next_bindings() while active"));
        }
        if self.ctx.is_none() {
            return Err(self.state_error("next_bindings() outside a binding scope"));
        }
        self.bindings = Some(bindings);
        Ok(())
    }

    /// Leaves the binding scope. The operator closes itself first.
    pub fn close_bindings(&mut self) {
        self.state = CursorState::Closed;
        self.bindings = None;
        self.ctx = None;
    }

    /// Checks that `open()` is legal. On error the caller closes the cursor.
    pub fn check_open(&self) -> ExecResult<()> {
        if self.state.is_active() {
            return Err(self.state_error("open() while active"));
        }
        if self.bindings.is_none() {
            return Err(self.state_error("open() before bindings were installed"));
        }
        Ok(())
    }

    /// Marks the cursor active.
    pub fn set_active(&mut self) {
        self.state = CursorState::Active;
        self.rows_produced = 0;
        debug!(cursor = self.name, "opened");
    }

    /// Marks the cursor closed. Returns whether it was active.
    pub fn set_closed(&mut self) -> bool {
        let was_active = self.state.is_active();
        if was_active {
            debug!(cursor = self.name, rows = self.rows_produced, "closed");
        }
        self.state = CursorState::Closed;
        was_active
    }

    /// Checks that the cursor is active before `operation`.
    pub fn check_active(&self, operation: &str) -> ExecResult<()> {
        if self.state.is_active() {
            Ok(())
        } else {
            Err(self.state_error(format!("{operation}() on a closed cursor")))
        }
    }

    /// Counts and optionally traces a row on its way out.
    pub fn produced(&mut self, row: Row) -> Row {
        self.rows_produced += 1;
        if self.ctx.as_ref().is_some_and(|c| c.config().log_execution) {
            trace!(cursor = self.name, row = %row, "yield");
        }
        row
    }

    /// Returns the context of the current binding scope.
    pub fn ctx(&self) -> ExecResult<&Arc<ExecutionContext>> {
        self.ctx.as_ref().ok_or_else(|| self.state_error("used outside a binding scope"))
    }

    /// Returns the bindings of the current execution.
    pub fn bindings(&self) -> ExecResult<&Arc<QueryBindings>> {
        self.bindings.as_ref().ok_or_else(|| self.state_error("no bindings installed"))
    }

    /// Creates a state error naming this cursor.
    #[must_use]
    pub fn state_error(&self, message: impl Into<String>) -> ExecError {
        ExecError::cursor_state(self.name, message)
    }
}
