//! Index scan with per-column directions.
//!
//! The physical index is ordered ascending on every field. A scan that
//! wants some fields descending splits the fields into segments:
//!
//! - each range-constrained field is a segment of its own
//! - the remaining fields form maximal runs of one direction
//!
//! Within a fixed prefix (the values of all earlier segments) a segment is
//! walked with prefix seeks: forward from its start when ascending,
//! backward from its end when descending. The next row after `r` is found
//! by trying the deepest segment first and moving outward, so a scan whose
//! fields all share one direction costs one seek per row.

use std::cmp::Ordering;
use std::sync::Arc;

use arbordb_core::catalog::IndexDef;
use arbordb_core::{compare_value_slices, compare_values, Direction, NullOrdering, Row, RowOrdering, RowType, Value};
use arbordb_storage::{SeekMode, SeekTarget, StoreCursor};

use super::key_range::{IndexKeyRange, ResolvedRange};
use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{ColumnSelector, Cursor, CursorBase, CursorState};

/// A run of index fields traversed in one direction.
#[derive(Debug, Clone)]
struct Segment {
    start: usize,
    end: usize,
    ascending: bool,
    lo: Option<(Value, bool)>,
    hi: Option<(Value, bool)>,
}

impl Segment {
    /// Returns false once `value` has passed the bound the traversal walks toward.
    fn within_far_end(&self, value: &Value) -> bool {
        let (bound, stop) = if self.ascending { (&self.hi, Ordering::Greater) } else { (&self.lo, Ordering::Less) };
        match bound {
            None => true,
            Some((bound, inclusive)) => match compare_values(value, bound) {
                Ordering::Equal => *inclusive,
                c => c != stop,
            },
        }
    }

    /// Returns the seek that starts the segment under `prefix`, and whether
    /// it seeks to `target` rather than to the range bound.
    fn start(&self, prefix: &[Value], target: &[Value]) -> (SeekMode, Vec<Value>, bool) {
        let mut key = prefix.to_vec();
        let (bound, ahead) = if self.ascending { (&self.lo, Ordering::Greater) } else { (&self.hi, Ordering::Less) };
        let target_first = target.first().is_some_and(|t| match bound {
            None => true,
            Some((bound, inclusive)) => match compare_values(t, bound) {
                Ordering::Equal => *inclusive,
                c => c == ahead,
            },
        });
        let at = if self.ascending { SeekMode::AtOrAfter } else { SeekMode::AtOrBefore };
        if target_first {
            key.extend_from_slice(target);
            return (at, key, true);
        }
        match bound {
            Some((value, inclusive)) => {
                key.push(value.clone());
                let mode = match (self.ascending, inclusive) {
                    (_, true) => at,
                    (true, false) => SeekMode::After,
                    (false, false) => SeekMode::Before,
                };
                (mode, key, false)
            }
            None => (at, key, false),
        }
    }

    /// Returns the seek past every row sharing `row`'s values up to this segment's end.
    fn past(&self, row: &Row) -> (SeekMode, Vec<Value>) {
        let mode = if self.ascending { SeekMode::After } else { SeekMode::Before };
        (mode, row.values()[..self.end].to_vec())
    }
}

fn plan_segments(directions: &[Direction], range: &ResolvedRange) -> Vec<Segment> {
    let width = range.width();
    let mut segments: Vec<Segment> = (0..width)
        .map(|column| {
            let (lo, hi) = range.bounds(column);
            Segment {
                start: column,
                end: column + 1,
                ascending: directions[column].is_ascending(),
                lo: lo.map(|(v, inclusive)| (v.clone(), inclusive)),
                hi: hi.map(|(v, inclusive)| (v.clone(), inclusive)),
            }
        })
        .collect();
    let mut start = width;
    while start < directions.len() {
        let direction = directions[start];
        let end = (start..directions.len()).find(|&c| directions[c] != direction).unwrap_or(directions.len());
        segments.push(Segment { start, end, ascending: direction.is_ascending(), lo: None, hi: None });
        start = end;
    }
    segments
}

#[derive(Debug)]
enum Position {
    /// The next row is already known.
    Ready(Row),
    /// The last row returned; the next is found from it.
    Emitted(Row),
    Done,
}

/// Scans one index within a key range in a declared order.
///
/// The ordering must list fields `0..n` in order with natural comparators;
/// fields past it take the direction of its last column (ascending if it
/// is empty). Index rows are unique, so the order is total.
pub struct IndexScan {
    base: CursorBase,
    index: Arc<IndexDef>,
    range: IndexKeyRange,
    ordering: RowOrdering,
    directions: Vec<Direction>,
    segments: Vec<Segment>,
    store: Option<Box<dyn StoreCursor>>,
    position: Position,
}

impl IndexScan {
    /// Creates an index scan.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidArgument`] if the ordering is not over
    /// the leading fields with natural comparators, or the range covers
    /// more fields than the index has.
    pub fn new(index: Arc<IndexDef>, range: IndexKeyRange, ordering: RowOrdering) -> ExecResult<Self> {
        let arity = index.row_type().arity();
        if ordering.len() > arity {
            return Err(ExecError::invalid_argument(format!(
                "ordering of {} columns on index {} with {arity} fields",
                ordering.len(),
                index.name()
            )));
        }
        for (position, column) in ordering.columns().iter().enumerate() {
            if column.column != position {
                return Err(ExecError::invalid_argument(format!(
                    "index ordering column {position} refers to field {}; it must list fields in index order",
                    column.column
                )));
            }
            if !column.comparator.is_natural() || column.nulls != NullOrdering::Low {
                return Err(ExecError::invalid_argument(format!(
                    "index ordering column {position} must use the index's natural order"
                )));
            }
        }
        if range.width() > arity {
            return Err(ExecError::invalid_argument(format!(
                "range bounds {} columns of index {} with {arity} fields",
                range.width(),
                index.name()
            )));
        }
        let last = ordering.columns().last().map_or(Direction::Ascending, |c| c.direction);
        let directions = (0..arity).map(|i| ordering.columns().get(i).map_or(last, |c| c.direction)).collect();
        Ok(Self {
            base: CursorBase::new("IndexScan", Arc::clone(index.row_type())),
            index,
            range,
            ordering,
            directions,
            segments: Vec::new(),
            store: None,
            position: Position::Done,
        })
    }

    /// Creates an ascending scan.
    pub fn ascending(index: Arc<IndexDef>, range: IndexKeyRange) -> ExecResult<Self> {
        Self::new(index, range, RowOrdering::new())
    }

    /// Returns the declared ordering.
    #[must_use]
    pub const fn ordering(&self) -> &RowOrdering {
        &self.ordering
    }

    /// Returns the scanned index.
    #[must_use]
    pub const fn index(&self) -> &Arc<IndexDef> {
        &self.index
    }

    fn seek(&mut self, mode: SeekMode, key: &[Value]) -> ExecResult<Option<Row>> {
        let store = self.store.as_mut().ok_or_else(|| self.base.state_error("no storage cursor"))?;
        let row = store.seek(SeekTarget::Key(key), mode)?;
        if row.is_some() {
            self.base.ctx()?.record_rows_read(1);
        }
        Ok(row)
    }

    /// Returns the first row of segment `g` under `prefix`, at or after
    /// `target` (the target's values from the segment's first field on).
    fn first_in(&mut self, prefix: &[Value], g: usize, target: &[Value]) -> ExecResult<Option<Row>> {
        let segment = &self.segments[g];
        let own = &target[..target.len().min(segment.end - segment.start)];
        let (mode, key, from_target) = segment.start(prefix, own);
        self.scan_from(prefix, g, mode, key, if from_target { target } else { &[] })
    }

    /// Walks segment `g` under `prefix` from a seek, descending into later
    /// segments, until a row is found or the segment is exhausted.
    fn scan_from(
        &mut self,
        prefix: &[Value],
        g: usize,
        mut mode: SeekMode,
        mut key: Vec<Value>,
        mut target: &[Value],
    ) -> ExecResult<Option<Row>> {
        loop {
            let Some(row) = self.seek(mode, &key)? else {
                return Ok(None);
            };
            let segment = &self.segments[g];
            let (start, end) = (segment.start, segment.end);
            if compare_value_slices(&row.values()[..start], prefix) != Ordering::Equal
                || !segment.within_far_end(&row.values()[start])
            {
                return Ok(None);
            }
            if g + 1 == self.segments.len() {
                return Ok(Some(row));
            }
            let width = end - start;
            let below = if target.len() > width
                && compare_value_slices(&row.values()[start..end], &target[..width]) == Ordering::Equal
            {
                &target[width..]
            } else {
                &[]
            };
            if let Some(found) = self.first_in(&row.values()[..end], g + 1, below)? {
                return Ok(Some(found));
            }
            (mode, key) = self.segments[g].past(&row);
            target = &[];
        }
    }

    fn successor(&mut self, last: &Row) -> ExecResult<Option<Row>> {
        for g in (0..self.segments.len()).rev() {
            let segment = &self.segments[g];
            let start = segment.start;
            let (mode, key) = segment.past(last);
            if let Some(row) = self.scan_from(&last.values()[..start], g, mode, key, &[])? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn position_at(&mut self, row: Option<Row>) {
        self.position = row.map_or(Position::Done, Position::Ready);
    }
}

impl Cursor for IndexScan {
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
        let resolved = self.range.resolve(self.base.bindings()?)?;
        self.segments = plan_segments(&self.directions, &resolved);
        self.store = Some(self.base.ctx()?.store()?.index_cursor(&self.index)?);
        self.base.set_active();
        match self.first_in(&[], 0, &[]) {
            Ok(first) => {
                self.position_at(first);
                Ok(())
            }
            Err(e) => {
                self.close()?;
                Err(e)
            }
        }
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        self.base.ctx()?.check_cancelled()?;
        let row = match std::mem::replace(&mut self.position, Position::Done) {
            Position::Ready(row) => Some(row),
            Position::Emitted(last) => self.successor(&last)?,
            Position::Done => None,
        };
        match row {
            Some(row) => {
                self.position = Position::Emitted(row.clone());
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
        self.base.ctx()?.record_jump();
        let width = selector.width(target.arity()).min(self.directions.len());
        let values = target.values()[..width].to_vec();
        let first = self.first_in(&[], 0, &values)?;
        self.position_at(first);
        Ok(())
    }

    fn close(&mut self) -> ExecResult<()> {
        self.store = None;
        self.position = Position::Done;
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
        "IndexScan"
    }
}
