//! Plan executor.
//!
//! The [`Executor`] drives a cursor tree through its lifecycle: it enters
//! the binding scope, opens the root once per bindings set, drains it, and
//! closes everything again, also when a row fails.

use std::sync::Arc;

use arbordb_core::{Row, RowType};
use tracing::debug;

use super::bindings::{QueryBindings, QueryBindingsCursor, SingletonBindingsCursor};
use super::context::ExecutionContext;
use super::cursor::{BoxedCursor, CursorState};
use crate::error::ExecResult;

/// Runs a cursor tree.
pub struct Executor {
    /// The root of the plan.
    root: BoxedCursor,
    /// Execution context shared with every cursor.
    ctx: Arc<ExecutionContext>,
}

impl Executor {
    /// Creates an executor for the plan rooted at `root`.
    #[must_use]
    pub fn new(root: BoxedCursor, ctx: Arc<ExecutionContext>) -> Self {
        Self { root, ctx }
    }

    /// Returns the root's row type.
    #[must_use]
    pub fn row_type(&self) -> Arc<RowType> {
        self.root.row_type()
    }

    /// Returns the execution context.
    #[must_use]
    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// Returns the root's state.
    #[must_use]
    pub fn state(&self) -> CursorState {
        self.root.state()
    }

    /// Runs the plan once with empty bindings and collects its rows.
    pub fn collect(&mut self) -> ExecResult<Vec<Row>> {
        let mut results = self.execute_all(&mut SingletonBindingsCursor::new(QueryBindings::new()))?;
        Ok(results.pop().unwrap_or_default())
    }

    /// Counts the rows of one run without keeping them.
    pub fn count(&mut self) -> ExecResult<usize> {
        self.root.open_top_level(&self.ctx)?;
        let mut count = 0;
        let drained = loop {
            match self.root.next() {
                Ok(Some(_)) => count += 1,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.ctx.record_rows_produced(count as u64);
        let closed = self.root.close_top_level();
        drained.and(closed)?;
        Ok(count)
    }

    /// Runs the plan once per bindings set, returning each run's rows.
    pub fn execute_all(&mut self, bindings: &mut dyn QueryBindingsCursor) -> ExecResult<Vec<Vec<Row>>> {
        self.root.open_bindings(&self.ctx)?;
        let result = self.run_each(bindings);
        let closed = self.root.close_bindings();
        let results = result?;
        closed?;
        debug!(cursor = self.root.name(), runs = results.len(), "execution finished");
        Ok(results)
    }

    fn run_each(&mut self, bindings: &mut dyn QueryBindingsCursor) -> ExecResult<Vec<Vec<Row>>> {
        let mut results = Vec::new();
        while let Some(next) = bindings.next_bindings() {
            self.root.next_bindings(next)?;
            self.root.open()?;
            let mut rows = Vec::new();
            while let Some(row) = self.root.next()? {
                rows.push(row);
            }
            self.ctx.record_rows_produced(rows.len() as u64);
            results.push(rows);
        }
        Ok(results)
    }
}
