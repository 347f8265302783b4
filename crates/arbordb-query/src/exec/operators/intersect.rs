//! Ordered intersection of two streams with optional skip-scan.
//!
//! Each input row consists of `fixed` leading fields, constant for one
//! execution, followed by its ordering fields. The first `n` ordering
//! fields of both sides are compared to decide matches, with `n` equal to
//! the length of the `ascending` list. Both streams must already be
//! ordered on those fields in the given directions.
//!
//! In skip-scan mode a lagging input is jumped straight to the leading
//! input's key instead of being stepped row by row. Both modes produce
//! the same rows.

use std::cmp::Ordering;
use std::sync::Arc;

use arbordb_core::{Comparator, Row, RowOverlay, RowType, SortColumn, Value};
use tracing::trace;

use super::flatten::JoinType;
use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{pull, BoxedCursor, ColumnSelector, Cursor, CursorBase, CursorState};

/// How a lagging input catches up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Jump to the other input's key.
    #[default]
    SkipScan,
    /// Step one row at a time.
    SequentialScan,
}

/// Which input the output rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSide {
    /// Rows of the left input.
    Left,
    /// Rows of the right input.
    Right,
}

/// Scan and output options of an [`IntersectOrdered`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectOptions {
    scan: ScanMode,
    output: OutputSide,
    output_equal: bool,
}

impl IntersectOptions {
    /// Skip-scan, emitting rows of `output`.
    #[must_use]
    pub const fn new(output: OutputSide) -> Self {
        Self { scan: ScanMode::SkipScan, output, output_equal: false }
    }

    /// Uses sequential scanning.
    #[must_use]
    pub const fn sequential(mut self) -> Self {
        self.scan = ScanMode::SequentialScan;
        self
    }

    /// Uses `scan`.
    #[must_use]
    pub const fn with_scan(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }

    /// Emits every output-side row of a match, not just the first.
    ///
    /// Without this, a match consumes one row from each side.
    #[must_use]
    pub const fn output_equal(mut self) -> Self {
        self.output_equal = true;
        self
    }

    /// Returns the scan mode.
    #[must_use]
    pub const fn scan(&self) -> ScanMode {
        self.scan
    }

    /// Returns the output side.
    #[must_use]
    pub const fn output(&self) -> OutputSide {
        self.output
    }
}

/// One input and its current row.
struct Side {
    input: BoxedCursor,
    row_type: Arc<RowType>,
    fixed: usize,
    row: Option<Row>,
}

impl Side {
    fn advance(&mut self) -> ExecResult<()> {
        self.row = pull(&mut self.input)?;
        Ok(())
    }

    /// Jumps to `fixed` fields of the current row followed by `key`, then
    /// reads the row landed on.
    fn skip_to(&mut self, key: &[Value], selector: ColumnSelector) -> ExecResult<()> {
        let Some(current) = &self.row else {
            return Ok(());
        };
        let mut skip = RowOverlay::nulls(Arc::clone(&self.row_type));
        for (f, value) in current.values().iter().take(self.fixed).enumerate() {
            skip.set(f, value.clone())?;
        }
        for (f, value) in key.iter().enumerate() {
            skip.set(self.fixed + f, value.clone())?;
        }
        let skip = skip.freeze();
        trace!(target_row = %skip, "intersect skip");
        self.input.jump(&skip, selector)?;
        self.advance()
    }

    fn key(&self, n: usize) -> Option<Vec<Value>> {
        self.row.as_ref().map(|r| key_of(r, self.fixed, n))
    }
}

fn key_of(row: &Row, fixed: usize, n: usize) -> Vec<Value> {
    (fixed..fixed + n).map(|f| row.value(f).cloned().unwrap_or(Value::Null)).collect()
}

/// Merges two ordered streams, emitting rows whose compared fields match.
///
/// A LEFT join also emits unmatched left rows and requires left output;
/// RIGHT mirrors it. FULL joins are not supported.
pub struct IntersectOrdered {
    base: CursorBase,
    left: Side,
    right: Side,
    /// One column per compared field, carrying its direction and comparator.
    fields: Vec<SortColumn>,
    join: JoinType,
    options: IntersectOptions,
}

impl IntersectOrdered {
    /// Creates an intersection.
    ///
    /// `left_ordering_fields` and `right_ordering_fields` count the trailing
    /// ordering fields of each side; `ascending` gives the direction of
    /// each compared field.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidArgument`] for a FULL join, a join type
    /// inconsistent with the output side, no compared fields, or more
    /// compared fields than either side orders on.
    pub fn new(
        left: BoxedCursor,
        right: BoxedCursor,
        left_ordering_fields: usize,
        right_ordering_fields: usize,
        ascending: &[bool],
        join: JoinType,
        options: IntersectOptions,
    ) -> ExecResult<Self> {
        let left_type = left.row_type();
        let right_type = right.row_type();
        let n = ascending.len();
        if left_ordering_fields > left_type.arity() || right_ordering_fields > right_type.arity() {
            return Err(ExecError::invalid_argument(format!(
                "ordering fields ({left_ordering_fields}, {right_ordering_fields}) exceed row arities ({}, {})",
                left_type.arity(),
                right_type.arity()
            )));
        }
        if n == 0 || n > left_ordering_fields.min(right_ordering_fields) {
            return Err(ExecError::invalid_argument(format!(
                "{n} compared fields for ordering fields ({left_ordering_fields}, {right_ordering_fields})"
            )));
        }
        let consistent = match join {
            JoinType::Inner => true,
            JoinType::Left => options.output == OutputSide::Left,
            JoinType::Right => options.output == OutputSide::Right,
            JoinType::Full => {
                return Err(ExecError::invalid_argument("intersect does not support FULL joins"));
            }
        };
        if !consistent {
            return Err(ExecError::invalid_argument(format!(
                "{join:?} join is inconsistent with {:?} output",
                options.output
            )));
        }

        let fields = ascending
            .iter()
            .enumerate()
            .map(|(i, &asc)| if asc { SortColumn::asc(i) } else { SortColumn::desc(i) })
            .collect();
        let row_type = match options.output {
            OutputSide::Left => Arc::clone(&left_type),
            OutputSide::Right => Arc::clone(&right_type),
        };
        Ok(Self {
            base: CursorBase::new("IntersectOrdered", row_type),
            left: Side { fixed: left_type.arity() - left_ordering_fields, row_type: left_type, input: left, row: None },
            right: Side {
                fixed: right_type.arity() - right_ordering_fields,
                row_type: right_type,
                input: right,
                row: None,
            },
            fields,
            join,
            options,
        })
    }

    /// Compares field `i` with `comparators[i]` instead of natural order.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidArgument`] unless there is one comparator
    /// per compared field, or none.
    pub fn with_comparators(mut self, comparators: Vec<Comparator>) -> ExecResult<Self> {
        if comparators.is_empty() {
            return Ok(self);
        }
        if comparators.len() != self.fields.len() {
            return Err(ExecError::invalid_argument(format!(
                "{} comparators for {} compared fields",
                comparators.len(),
                self.fields.len()
            )));
        }
        for (field, comparator) in self.fields.iter_mut().zip(comparators) {
            field.comparator = comparator;
        }
        Ok(self)
    }

    fn keep_unmatched_left(&self) -> bool {
        self.join == JoinType::Left
    }

    fn keep_unmatched_right(&self) -> bool {
        self.join == JoinType::Right
    }

    fn selector(&self, fixed: usize) -> ColumnSelector {
        ColumnSelector::Prefix(fixed + self.fields.len())
    }

    /// Compares the first `n` compared fields of `a` and `b`, directions applied.
    fn compare(&self, a: &Row, a_fixed: usize, b: &Row, b_fixed: usize) -> Ordering {
        for (i, field) in self.fields.iter().enumerate() {
            let x = a.value(a_fixed + i).unwrap_or(&Value::Null);
            let y = b.value(b_fixed + i).unwrap_or(&Value::Null);
            let c = field.compare(x, y);
            if c != Ordering::Equal {
                return c;
            }
        }
        Ordering::Equal
    }

    /// Compares the current rows. An exhausted side sorts last.
    fn compare_current(&self) -> Ordering {
        match (&self.left.row, &self.right.row) {
            (None, _) => Ordering::Greater,
            (_, None) => Ordering::Less,
            (Some(l), Some(r)) => self.compare(l, self.left.fixed, r, self.right.fixed),
        }
    }

    fn exhausted(&self) -> bool {
        let left_empty = self.left.row.is_none();
        let right_empty = self.right.row.is_none();
        (left_empty && right_empty)
            || (left_empty && !self.keep_unmatched_right())
            || (right_empty && !self.keep_unmatched_left())
    }

    fn skipping(&self) -> bool {
        self.options.scan == ScanMode::SkipScan
    }

    /// Moves the left side up to the right side's key.
    fn catch_up_left(&mut self) -> ExecResult<()> {
        match self.right.key(self.fields.len()) {
            Some(key) if self.skipping() => {
                let selector = self.selector(self.left.fixed);
                self.left.skip_to(&key, selector)
            }
            _ => self.left.advance(),
        }
    }

    fn catch_up_right(&mut self) -> ExecResult<()> {
        match self.left.key(self.fields.len()) {
            Some(key) if self.skipping() => {
                let selector = self.selector(self.right.fixed);
                self.right.skip_to(&key, selector)
            }
            _ => self.right.advance(),
        }
    }

    /// Runs one merge step, returning the row to emit, if any.
    fn step(&mut self) -> ExecResult<Option<Row>> {
        match self.compare_current() {
            Ordering::Less => {
                if self.keep_unmatched_left() {
                    let row = self.left.row.take();
                    self.left.advance()?;
                    return Ok(row);
                }
                self.catch_up_left()?;
                Ok(None)
            }
            Ordering::Greater => {
                if self.keep_unmatched_right() {
                    let row = self.right.row.take();
                    self.right.advance()?;
                    return Ok(row);
                }
                self.catch_up_right()?;
                Ok(None)
            }
            Ordering::Equal => {
                let (out, other) = match self.options.output {
                    OutputSide::Left => (&mut self.left, &mut self.right),
                    OutputSide::Right => (&mut self.right, &mut self.left),
                };
                let row = out.row.take();
                if !self.options.output_equal {
                    other.advance()?;
                }
                out.advance()?;
                Ok(row)
            }
        }
    }
}

impl IntersectOrdered {
    fn open_inputs(&mut self) -> ExecResult<()> {
        self.left.input.open()?;
        self.right.input.open()?;
        self.left.advance()?;
        self.right.advance()
    }
}

impl Cursor for IntersectOrdered {
    fn open_bindings(&mut self, ctx: &Arc<ExecutionContext>) -> ExecResult<()> {
        self.base.open_bindings(ctx);
        self.left.input.open_bindings(ctx)?;
        self.right.input.open_bindings(ctx)
    }

    fn next_bindings(&mut self, bindings: Arc<QueryBindings>) -> ExecResult<()> {
        self.base.next_bindings(Arc::clone(&bindings))?;
        self.left.input.next_bindings(Arc::clone(&bindings))?;
        self.right.input.next_bindings(bindings)
    }

    fn close_bindings(&mut self) -> ExecResult<()> {
        self.close()?;
        self.left.input.close_bindings()?;
        self.right.input.close_bindings()?;
        self.base.close_bindings();
        Ok(())
    }

    fn open(&mut self) -> ExecResult<()> {
        if let Err(e) = self.base.check_open() {
            self.close()?;
            return Err(e);
        }
        if let Err(e) = self.open_inputs() {
            // Inputs opened before the failure must not stay active.
            self.left.input.close()?;
            self.right.input.close()?;
            self.left.row = None;
            self.right.row = None;
            return Err(e);
        }
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        loop {
            if self.exhausted() {
                self.close()?;
                return Ok(None);
            }
            if let Some(row) = self.step()? {
                return Ok(Some(self.base.produced(row)));
            }
        }
    }

    fn jump(&mut self, target: &Row, selector: ColumnSelector) -> ExecResult<()> {
        self.base.check_active("jump")?;
        self.base.ctx()?.record_jump();
        let target_fixed = match self.options.output {
            OutputSide::Left => self.left.fixed,
            OutputSide::Right => self.right.fixed,
        };
        let key = key_of(target, target_fixed, self.fields.len());
        // A side already at or past the target stays put.
        for left_side in [true, false] {
            let side = if left_side { &self.left } else { &self.right };
            let behind = side
                .row
                .as_ref()
                .is_some_and(|row| self.compare(row, side.fixed, target, target_fixed) == Ordering::Less);
            if behind {
                let side = if left_side { &mut self.left } else { &mut self.right };
                side.skip_to(&key, selector)?;
            }
        }
        if self.exhausted() {
            self.close()?;
        }
        Ok(())
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.set_closed() {
            self.left.input.close()?;
            self.right.input.close()?;
        }
        self.left.row = None;
        self.right.row = None;
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "IntersectOrdered"
    }
}
