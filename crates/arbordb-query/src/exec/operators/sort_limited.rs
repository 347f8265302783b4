//! Bounded top-K sort by insertion.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

use arbordb_core::{Row, RowOrdering, RowType};

use super::sort::{effective_ordering, SortOption};
use crate::error::ExecResult;
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{pull, BoxedCursor, Cursor, CursorBase, CursorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Closed,
    Filling,
    Emptying,
}

/// Emits the first `limit` rows of the input in sorted order while holding
/// at most `limit` rows.
///
/// Rows that compare equal keep their arrival order, and when the buffer is
/// full an incoming row only displaces a strictly greater one, so earlier
/// rows win ties.
pub struct SortInsertionLimited {
    base: CursorBase,
    input: BoxedCursor,
    ordering: RowOrdering,
    option: SortOption,
    limit: usize,
    phase: Phase,
    retained: Vec<Row>,
    output: VecDeque<Row>,
}

impl SortInsertionLimited {
    /// Creates a sort keeping the first `limit` rows by `ordering`.
    #[must_use]
    pub fn new(input: BoxedCursor, ordering: RowOrdering, option: SortOption, limit: usize) -> Self {
        let row_type = input.row_type();
        let ordering = effective_ordering(&ordering, option, row_type.arity());
        Self {
            base: CursorBase::new("SortInsertionLimited", row_type),
            input,
            ordering,
            option,
            limit,
            phase: Phase::Closed,
            retained: Vec::with_capacity(limit.min(1024)),
            output: VecDeque::new(),
        }
    }

    /// Returns the row limit.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    fn insert(&mut self, row: Row) {
        let ordering = &self.ordering;
        if self.option == SortOption::SuppressDuplicates {
            let first_not_less = self.retained.partition_point(|r| ordering.compare_rows(r, &row) == Ordering::Less);
            if self.retained.get(first_not_less).is_some_and(|r| ordering.compare_rows(r, &row) == Ordering::Equal) {
                return;
            }
        }
        if self.retained.len() == self.limit {
            let displaces =
                self.retained.last().is_some_and(|last| ordering.compare_rows(last, &row) == Ordering::Greater);
            if !displaces {
                return;
            }
            self.retained.pop();
        }
        // After every equal row, so ties stay in arrival order.
        let position = self.retained.partition_point(|r| ordering.compare_rows(r, &row) != Ordering::Greater);
        self.retained.insert(position, row);
    }

    fn fill(&mut self) -> ExecResult<()> {
        while let Some(row) = pull(&mut self.input)? {
            self.insert(row);
        }
        self.output = std::mem::take(&mut self.retained).into();
        self.phase = Phase::Emptying;
        Ok(())
    }
}

impl Cursor for SortInsertionLimited {
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
        if self.limit == 0 {
            // Nothing can be emitted, so the input is never read.
            self.output.clear();
            self.phase = Phase::Emptying;
        } else {
            self.input.open()?;
            self.phase = Phase::Filling;
        }
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        if self.phase == Phase::Filling {
            self.fill()?;
        }
        match self.output.pop_front() {
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
        self.retained.clear();
        self.output.clear();
        self.phase = Phase::Closed;
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "SortInsertionLimited"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arbordb_core::{Field, HKey, SortColumn, Value, ValueType};

    use crate::exec::operators::values::ValuesScan;

    /// Rows `(key, arrival)`.
    fn keyed(keys: &[i64]) -> BoxedCursor {
        let row_type = RowType::derived("k", vec![Field::new("key", ValueType::Int), Field::new("seq", ValueType::Int)]);
        let rows = keys
            .iter()
            .zip(0..)
            .map(|(&k, seq)| Row::new(Arc::clone(&row_type), vec![Value::Int(k), Value::Int(seq)], HKey::empty()).unwrap())
            .collect();
        Box::new(ValuesScan::new(row_type, rows).unwrap())
    }

    fn run(op: &mut SortInsertionLimited) -> Vec<(i64, i64)> {
        let ctx = Arc::new(ExecutionContext::new());
        op.open_top_level(&ctx).unwrap();
        let mut out = Vec::new();
        while let Some(row) = op.next().unwrap() {
            out.push((row.values()[0].as_int().unwrap(), row.values()[1].as_int().unwrap()));
        }
        op.close_top_level().unwrap();
        out
    }

    fn by_key() -> RowOrdering {
        RowOrdering::new().then(SortColumn::asc(0))
    }

    #[test]
    fn keeps_the_smallest_rows() {
        let mut op = SortInsertionLimited::new(keyed(&[5, 1, 4, 2, 3]), by_key(), SortOption::PreserveDuplicates, 3);
        assert_eq!(run(&mut op), vec![(1, 1), (2, 3), (3, 4)]);
    }

    #[test]
    fn earlier_rows_win_ties() {
        let mut op = SortInsertionLimited::new(keyed(&[2, 1, 2, 2, 1]), by_key(), SortOption::PreserveDuplicates, 3);
        assert_eq!(run(&mut op), vec![(1, 1), (1, 4), (2, 0)]);
    }

    #[test]
    fn suppression_keeps_first_of_equal_rows() {
        let row_type = RowType::derived("k", vec![Field::new("key", ValueType::Int)]);
        let rows = [3, 1, 3, 1, 2]
            .iter()
            .map(|&k| Row::new(Arc::clone(&row_type), vec![Value::Int(k)], HKey::empty()).unwrap())
            .collect();
        let input = Box::new(ValuesScan::new(row_type, rows).unwrap());
        let ordering = RowOrdering::new().then(SortColumn::desc(0));
        let mut op = SortInsertionLimited::new(input, ordering, SortOption::SuppressDuplicates, 10);
        let ctx = Arc::new(ExecutionContext::new());
        op.open_top_level(&ctx).unwrap();
        let mut keys = Vec::new();
        while let Some(row) = op.next().unwrap() {
            keys.push(row.values()[0].as_int().unwrap());
        }
        assert_eq!(keys, vec![3, 2, 1]);
    }

    #[test]
    fn zero_limit_is_empty() {
        let mut op = SortInsertionLimited::new(keyed(&[1, 2]), by_key(), SortOption::PreserveDuplicates, 0);
        assert!(run(&mut op).is_empty());
    }

    #[test]
    fn reopen_refills() {
        let mut op = SortInsertionLimited::new(keyed(&[3, 1, 2]), by_key(), SortOption::PreserveDuplicates, 2);
        assert_eq!(run(&mut op), vec![(1, 1), (2, 2)]);
        assert_eq!(run(&mut op), vec![(1, 1), (2, 2)]);
    }
}
