//! Adjacent-duplicate elimination.

use std::cmp::Ordering;
use std::sync::Arc;

use arbordb_core::{Comparator, Row, RowType, Value};

use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{pull, BoxedCursor, Cursor, CursorBase, CursorState};

/// Drops each row equal to the row emitted just before it.
///
/// Only adjacent duplicates are removed, so the output is fully distinct
/// when equal rows arrive together (a sorted input, for example). Fields
/// compare with one [`Comparator`] per column; nulls equal nulls.
pub struct DistinctPartial {
    base: CursorBase,
    input: BoxedCursor,
    comparators: Vec<Comparator>,
    last: Option<Row>,
}

impl DistinctPartial {
    /// Creates the operator. An empty comparator list compares every
    /// column naturally.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidArgument`] if `comparators` is neither
    /// empty nor one per column of the input.
    pub fn new(input: BoxedCursor, comparators: Vec<Comparator>) -> ExecResult<Self> {
        let row_type = input.row_type();
        if !comparators.is_empty() && comparators.len() != row_type.arity() {
            return Err(ExecError::invalid_argument(format!(
                "{} comparators for {} columns of {}",
                comparators.len(),
                row_type.arity(),
                row_type.name()
            )));
        }
        Ok(Self { base: CursorBase::new("DistinctPartial", row_type), input, comparators, last: None })
    }

    fn is_duplicate(&self, row: &Row) -> bool {
        let Some(last) = &self.last else {
            return false;
        };
        if last.arity() != row.arity() {
            return false;
        }
        last.values().iter().zip(row.values()).enumerate().all(|(i, (a, b))| self.compare(i, a, b) == Ordering::Equal)
    }

    fn compare(&self, column: usize, a: &Value, b: &Value) -> Ordering {
        match self.comparators.get(column) {
            Some(comparator) => comparator.compare(a, b),
            None => Comparator::Natural.compare(a, b),
        }
    }
}

impl Cursor for DistinctPartial {
    fn open_bindings(&mut self, ctx: &Arc<ExecutionContext>) -> ExecResult<()> {
        self.base.open_bindings(ctx);
        self.input.open_bindings(ctx)
    }

    fn next_bindings(&mut self, bindings: Arc<QueryBindings>) -> ExecResult<()> {
        self.base.next_bindings(Arc::clone(&bindings))?;
        self.input.next_bindings(bindings)
    }

    fn close_bindings(&mut self) -> ExecResult<()> {
        self.close()?;
        self.input.close_bindings()?;
        self.base.close_bindings();
        Ok(())
    }

    fn open(&mut self) -> ExecResult<()> {
        if let Err(e) = self.base.check_open() {
            self.close()?;
            return Err(e);
        }
        self.input.open()?;
        self.last = None;
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        while let Some(row) = pull(&mut self.input)? {
            if !self.is_duplicate(&row) {
                self.last = Some(row.clone());
                return Ok(Some(self.base.produced(row)));
            }
        }
        self.close()?;
        Ok(None)
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.set_closed() {
            self.input.close()?;
        }
        self.last = None;
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "DistinctPartial"
    }
}
