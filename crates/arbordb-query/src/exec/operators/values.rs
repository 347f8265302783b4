//! Literal row source.

use std::cmp::Ordering;
use std::sync::Arc;

use arbordb_core::{Row, RowOrdering, RowType};

use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{ColumnSelector, Cursor, CursorBase, CursorState};

/// Produces a fixed list of rows.
///
/// With an ordering the rows are sorted by it up front and the scan
/// supports `jump`.
pub struct ValuesScan {
    base: CursorBase,
    rows: Vec<Row>,
    ordering: Option<RowOrdering>,
    position: usize,
}

impl ValuesScan {
    /// Creates a scan over `rows` in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::DataShape`] if a row is not of `row_type`.
    pub fn new(row_type: Arc<RowType>, rows: Vec<Row>) -> ExecResult<Self> {
        if let Some(row) = rows.iter().find(|r| !r.row_type().same_as(&row_type)) {
            return Err(ExecError::DataShape(format!(
                "row of type {} in a scan of {}",
                row.row_type().name(),
                row_type.name()
            )));
        }
        Ok(Self { base: CursorBase::new("ValuesScan", row_type), rows, ordering: None, position: 0 })
    }

    /// Sorts the rows by `ordering` and enables `jump`.
    #[must_use]
    pub fn ordered_by(mut self, ordering: RowOrdering) -> Self {
        self.rows.sort_by(|a, b| ordering.compare_rows(a, b));
        self.ordering = Some(ordering);
        self
    }
}

impl Cursor for ValuesScan {
    fn open_bindings(&mut self, ctx: &Arc<ExecutionContext>) -> ExecResult<()> {
        self.base.open_bindings(ctx);
        Ok(())
    }

    fn next_bindings(&mut self, bindings: Arc<QueryBindings>) -> ExecResult<()> {
        self.base.next_bindings(bindings)
    }

    fn close_bindings(&mut self) -> ExecResult<()> {
        self.close()?;
        self.base.close_bindings();
        Ok(())
    }

    fn open(&mut self) -> ExecResult<()> {
        if let Err(e) = self.base.check_open() {
            self.close()?;
            return Err(e);
        }
        self.position = 0;
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        let ctx = self.base.ctx()?;
        ctx.check_cancelled()?;
        match self.rows.get(self.position).cloned() {
            Some(row) => {
                ctx.record_rows_read(1);
                self.position += 1;
                Ok(Some(self.base.produced(row)))
            }
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    fn jump(&mut self, target: &Row, selector: ColumnSelector) -> ExecResult<()> {
        self.base.check_active("jump")?;
        let ordering = self
            .ordering
            .as_ref()
            .ok_or_else(|| ExecError::Unsupported("jump on a ValuesScan without an ordering".into()))?;
        self.base.ctx()?.record_jump();
        let width = selector.width(target.arity());
        let n = ordering.columns().iter().take_while(|c| c.column < width).count();
        self.position =
            self.rows.partition_point(|r| ordering.compare_prefix(r.values(), target.values(), n) == Ordering::Less);
        Ok(())
    }

    fn close(&mut self) -> ExecResult<()> {
        self.position = self.rows.len();
        self.base.set_closed();
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "ValuesScan"
    }
}
