//! Cursor over an in-memory sorted snapshot.

use std::cmp::Ordering;
use std::sync::Arc;

use arbordb_core::{compare_value_slices, Row};

use crate::engine::{CursorResult, SeekMode, SeekTarget, StorageError, StoreCursor};

/// How a snapshot's rows are sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SortedBy {
    /// By hkey (the group scan).
    HKey,
    /// By all field values (an index).
    Values,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    AfterLast,
}

/// A cursor over a shared, immutable, sorted row vector.
#[derive(Debug)]
pub struct MemoryCursor {
    rows: Arc<Vec<Row>>,
    sorted_by: SortedBy,
    position: Position,
}

impl MemoryCursor {
    pub(crate) fn new(rows: Arc<Vec<Row>>, sorted_by: SortedBy) -> Self {
        Self { rows, sorted_by, position: Position::BeforeFirst }
    }

    fn land(&mut self, index: Option<usize>, fell_off: Position) -> CursorResult {
        match index.filter(|&i| i < self.rows.len()) {
            Some(i) => {
                self.position = Position::At(i);
                Ok(Some(self.rows[i].clone()))
            }
            None => {
                self.position = fell_off;
                Ok(None)
            }
        }
    }

    fn compare(&self, row: &Row, target: SeekTarget<'_>) -> Result<Ordering, StorageError> {
        match (target, self.sorted_by) {
            (SeekTarget::HKey(hkey), SortedBy::HKey) => Ok(row.hkey().cmp(hkey)),
            (SeekTarget::Key(key), SortedBy::Values) => {
                let n = key.len().min(row.arity());
                Ok(compare_value_slices(&row.values()[..n], key))
            }
            (SeekTarget::Key(_), SortedBy::HKey) => {
                Err(StorageError::UnsupportedSeek("key seek on an hkey-ordered cursor".into()))
            }
            (SeekTarget::HKey(_), SortedBy::Values) => {
                Err(StorageError::UnsupportedSeek("hkey seek on a key-ordered cursor".into()))
            }
        }
    }

    /// Returns the first index whose entry does not satisfy `pred`.
    fn partition(&self, target: SeekTarget<'_>, pred: fn(Ordering) -> bool) -> Result<usize, StorageError> {
        // Surface a mismatched target even on an empty snapshot.
        if self.rows.is_empty() {
            return match (target, self.sorted_by) {
                (SeekTarget::HKey(_), SortedBy::HKey) | (SeekTarget::Key(_), SortedBy::Values) => Ok(0),
                _ => Err(StorageError::UnsupportedSeek("seek target does not match cursor order".into())),
            };
        }
        let mut error = None;
        let index = self.rows.partition_point(|row| match self.compare(row, target) {
            Ok(c) => pred(c),
            Err(e) => {
                error.get_or_insert(e);
                false
            }
        });
        error.map_or(Ok(index), Err)
    }
}

impl StoreCursor for MemoryCursor {
    fn seek(&mut self, target: SeekTarget<'_>, mode: SeekMode) -> CursorResult {
        match mode {
            SeekMode::AtOrAfter => {
                let i = self.partition(target, Ordering::is_lt)?;
                self.land(Some(i), Position::AfterLast)
            }
            SeekMode::After => {
                let i = self.partition(target, Ordering::is_le)?;
                self.land(Some(i), Position::AfterLast)
            }
            SeekMode::AtOrBefore => {
                let i = self.partition(target, Ordering::is_le)?;
                self.land(i.checked_sub(1), Position::BeforeFirst)
            }
            SeekMode::Before => {
                let i = self.partition(target, Ordering::is_lt)?;
                self.land(i.checked_sub(1), Position::BeforeFirst)
            }
        }
    }

    fn seek_first(&mut self) -> CursorResult {
        self.land(Some(0), Position::AfterLast)
    }

    fn seek_last(&mut self) -> CursorResult {
        self.land(self.rows.len().checked_sub(1), Position::BeforeFirst)
    }

    fn next(&mut self) -> CursorResult {
        match self.position {
            Position::BeforeFirst => self.seek_first(),
            Position::At(i) => self.land(Some(i + 1), Position::AfterLast),
            Position::AfterLast => Ok(None),
        }
    }

    fn prev(&mut self) -> CursorResult {
        match self.position {
            Position::AfterLast => self.seek_last(),
            Position::At(i) => self.land(i.checked_sub(1), Position::BeforeFirst),
            Position::BeforeFirst => Ok(None),
        }
    }

    fn current(&self) -> Option<&Row> {
        match self.position {
            Position::At(i) => self.rows.get(i),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arbordb_core::{Field, HKey, RowType, Value, ValueType};

    fn rows(keys: &[(i64, i64)]) -> Arc<Vec<Row>> {
        let row_type = RowType::derived("pair", vec![Field::new("a", ValueType::Int), Field::new("b", ValueType::Int)]);
        Arc::new(
            keys.iter()
                .map(|&(a, b)| Row::new(Arc::clone(&row_type), vec![Value::Int(a), Value::Int(b)], HKey::empty()).unwrap())
                .collect(),
        )
    }

    fn first_field(row: Option<Row>) -> Option<(i64, i64)> {
        row.map(|r| (r.values()[0].as_int().unwrap(), r.values()[1].as_int().unwrap()))
    }

    #[test]
    fn prefix_seeks() {
        let mut cursor = MemoryCursor::new(rows(&[(1, 1), (1, 2), (2, 1), (2, 2), (3, 1)]), SortedBy::Values);
        let two = [Value::Int(2)];

        assert_eq!(first_field(cursor.seek(SeekTarget::Key(&two), SeekMode::AtOrAfter).unwrap()), Some((2, 1)));
        assert_eq!(first_field(cursor.seek(SeekTarget::Key(&two), SeekMode::After).unwrap()), Some((3, 1)));
        assert_eq!(first_field(cursor.seek(SeekTarget::Key(&two), SeekMode::AtOrBefore).unwrap()), Some((2, 2)));
        assert_eq!(first_field(cursor.seek(SeekTarget::Key(&two), SeekMode::Before).unwrap()), Some((1, 2)));
    }

    #[test]
    fn falls_off_both_ends() {
        let mut cursor = MemoryCursor::new(rows(&[(1, 1), (2, 1)]), SortedBy::Values);
        let zero = [Value::Int(0)];
        let nine = [Value::Int(9)];

        assert!(cursor.seek(SeekTarget::Key(&nine), SeekMode::AtOrAfter).unwrap().is_none());
        assert_eq!(first_field(cursor.prev().unwrap()), Some((2, 1)));
        assert!(cursor.seek(SeekTarget::Key(&zero), SeekMode::Before).unwrap().is_none());
        assert_eq!(first_field(cursor.next().unwrap()), Some((1, 1)));
        assert_eq!(first_field(cursor.current().cloned()), Some((1, 1)));
    }

    #[test]
    fn mismatched_seek_target_is_rejected() {
        let mut cursor = MemoryCursor::new(rows(&[(1, 1)]), SortedBy::Values);
        let hkey = HKey::empty();
        assert!(matches!(
            cursor.seek(SeekTarget::HKey(&hkey), SeekMode::AtOrAfter),
            Err(StorageError::UnsupportedSeek(_))
        ));
    }
}
