//! Full in-memory sort.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use arbordb_core::{Row, RowOrdering, RowType};
use tracing::warn;

use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{pull, BoxedCursor, Cursor, CursorBase, CursorState};

/// Whether a sort keeps rows that compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOption {
    /// Keep every row.
    #[default]
    PreserveDuplicates,
    /// Keep the first of each run of equal rows.
    ///
    /// Equality extends the ordering with every unmentioned column,
    /// ascending and natural.
    SuppressDuplicates,
}

/// Returns the ordering a sort compares with.
pub(crate) fn effective_ordering(ordering: &RowOrdering, option: SortOption, arity: usize) -> RowOrdering {
    match option {
        SortOption::PreserveDuplicates => ordering.clone(),
        SortOption::SuppressDuplicates => ordering.covering(arity),
    }
}

/// Buffers the whole input and emits it sorted.
///
/// The sort is stable: rows equal under the ordering keep their input
/// order.
pub struct SortGeneral {
    base: CursorBase,
    input: BoxedCursor,
    ordering: RowOrdering,
    option: SortOption,
    sorted: VecDeque<Row>,
}

impl SortGeneral {
    /// Creates a sort of `input` by `ordering`.
    #[must_use]
    pub fn new(input: BoxedCursor, ordering: RowOrdering, option: SortOption) -> Self {
        let row_type = input.row_type();
        let ordering = effective_ordering(&ordering, option, row_type.arity());
        Self { base: CursorBase::new("SortGeneral", row_type), input, ordering, option, sorted: VecDeque::new() }
    }

    /// Returns the ordering rows are compared with.
    #[must_use]
    pub const fn ordering(&self) -> &RowOrdering {
        &self.ordering
    }

    fn load(&mut self) -> ExecResult<()> {
        let limit = self.base.ctx()?.max_rows_in_memory();
        let warn_at = limit - limit / 10;
        let mut rows = Vec::new();
        while let Some(row) = pull(&mut self.input)? {
            rows.push(row);
            if limit > 0 {
                if rows.len() > limit {
                    return Err(ExecError::QueryTooLarge { actual: rows.len(), limit });
                }
                if rows.len() == warn_at {
                    warn!(cursor = self.base.name(), rows = rows.len(), limit, "sort buffer approaching row limit");
                }
            }
        }
        rows.sort_by(|a, b| self.ordering.compare_rows(a, b));
        if self.option == SortOption::SuppressDuplicates {
            rows.dedup_by(|later, earlier| self.ordering.compare_rows(earlier, later) == Ordering::Equal);
        }
        self.sorted = rows.into();
        Ok(())
    }
}

impl Cursor for SortGeneral {
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
        if let Err(e) = self.load() {
            self.input.close()?;
            self.sorted.clear();
            return Err(e);
        }
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        match self.sorted.pop_front() {
            Some(row) => Ok(Some(self.base.produced(row))),
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.set_closed() {
            self.input.close()?;
        }
        self.sorted.clear();
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "SortGeneral"
    }
}
