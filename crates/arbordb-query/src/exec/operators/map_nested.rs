//! Nested-loop mapping: runs an inner plan once per outer row.

use std::sync::Arc;

use arbordb_core::{Row, RowType};

use crate::error::ExecResult;
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{pull, BoxedCursor, Cursor, CursorBase, CursorState};

/// For each outer row, binds the row at `binding_position` and emits every
/// row of the inner plan.
///
/// The inner plan sees a child of the current bindings, so it can also read
/// every parameter bound above this operator. Inner scans refer to the
/// outer row through [`BoundExpr::BoundField`](super::BoundExpr::BoundField).
pub struct MapNestedLoops {
    base: CursorBase,
    outer: BoxedCursor,
    inner: BoxedCursor,
    binding_position: usize,
}

impl MapNestedLoops {
    /// Creates the mapping. The output row type is the inner plan's.
    #[must_use]
    pub fn new(outer: BoxedCursor, inner: BoxedCursor, binding_position: usize) -> Self {
        let row_type = inner.row_type();
        Self { base: CursorBase::new("MapNestedLoops", row_type), outer, inner, binding_position }
    }

    /// Returns the binding position of the outer row.
    #[must_use]
    pub const fn binding_position(&self) -> usize {
        self.binding_position
    }

    fn start_inner(&mut self, outer_row: Row) -> ExecResult<()> {
        let bindings = QueryBindings::child_of(self.base.bindings()?).with_row(self.binding_position, outer_row);
        self.inner.next_bindings(Arc::new(bindings))?;
        self.inner.open()
    }
}

impl Cursor for MapNestedLoops {
    fn open_bindings(&mut self, ctx: &Arc<ExecutionContext>) -> ExecResult<()> {
        self.base.open_bindings(ctx);
        self.outer.open_bindings(ctx)?;
        self.inner.open_bindings(ctx)
    }

    fn next_bindings(&mut self, bindings: Arc<QueryBindings>) -> ExecResult<()> {
        self.base.next_bindings(Arc::clone(&bindings))?;
        self.outer.next_bindings(bindings)
    }

    fn close_bindings(&mut self) -> ExecResult<()> {
        self.close()?;
        self.outer.close_bindings()?;
        self.inner.close_bindings()?;
        self.base.close_bindings();
        Ok(())
    }

    fn open(&mut self) -> ExecResult<()> {
        if let Err(e) = self.base.check_open() {
            self.close()?;
            return Err(e);
        }
        self.outer.open()?;
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        loop {
            if let Some(row) = pull(&mut self.inner)? {
                return Ok(Some(self.base.produced(row)));
            }
            match pull(&mut self.outer)? {
                Some(outer_row) => self.start_inner(outer_row)?,
                None => {
                    self.close()?;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.set_closed() {
            self.inner.close()?;
            self.outer.close()?;
        }
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "MapNestedLoops"
    }
}
