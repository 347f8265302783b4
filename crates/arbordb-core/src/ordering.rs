//! Orderings and comparators.
//!
//! A [`RowOrdering`] is a list of [`SortColumn`]s, each naming a field, a
//! [`Direction`] and a [`Comparator`]. Comparators are either natural value
//! order or a custom [`ValueComparator`] such as a collation; there is no
//! "null means natural" convention.
//!
//! Orderings are immutable once built and are shared between cursors by
//! cloning, so custom comparators must be `Send + Sync`.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::types::{compare_values, Row, Value};

/// A pluggable comparison of two values of one column.
pub trait ValueComparator: Send + Sync + fmt::Debug {
    /// Returns the collation or comparator name.
    fn name(&self) -> &str;

    /// Compares two non-null values.
    fn compare(&self, a: &Value, b: &Value) -> Ordering;
}

/// How to compare two values of a column.
#[derive(Debug, Clone, Default)]
pub enum Comparator {
    /// Natural value order (see [`compare_values`]).
    #[default]
    Natural,
    /// A custom comparator, e.g. a collation.
    Custom(Arc<dyn ValueComparator>),
}

impl Comparator {
    /// Returns the case-insensitive collation.
    #[must_use]
    pub fn case_insensitive() -> Self {
        Self::Custom(Arc::new(CaseInsensitive))
    }

    /// Compares two values. Nulls sort low in both variants.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            Self::Natural => compare_values(a, b),
            Self::Custom(custom) => match (a.is_null(), b.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => custom.compare(a, b),
            },
        }
    }

    /// Returns true for [`Comparator::Natural`].
    #[must_use]
    pub const fn is_natural(&self) -> bool {
        matches!(self, Self::Natural)
    }
}

/// Case-insensitive string collation. Non-string values compare naturally.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaseInsensitive;

impl ValueComparator for CaseInsensitive {
    fn name(&self) -> &str {
        "case_insensitive"
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (a, b) {
            (Value::String(x), Value::String(y)) => {
                x.chars().flat_map(char::to_lowercase).cmp(y.chars().flat_map(char::to_lowercase))
            }
            _ => compare_values(a, b),
        }
    }
}

/// Resolves collation names to comparators.
pub trait CollationProvider: Send + Sync {
    /// Returns the comparator for `collation`, or `None` if unknown.
    fn comparator(&self, collation: &str) -> Option<Comparator>;
}

/// The built-in collations: `binary` and `case_insensitive`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollations;

impl CollationProvider for DefaultCollations {
    fn comparator(&self, collation: &str) -> Option<Comparator> {
        match collation {
            "binary" => Some(Comparator::Natural),
            "case_insensitive" => Some(Comparator::case_insensitive()),
            _ => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl Direction {
    /// Returns true for ascending.
    #[must_use]
    pub const fn is_ascending(self) -> bool {
        matches!(self, Self::Ascending)
    }

    /// Returns the opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// Applies the direction to an ascending comparison.
    #[must_use]
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Where nulls go before the direction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullOrdering {
    /// Nulls compare below every value.
    #[default]
    Low,
    /// Nulls compare above every value.
    High,
}

/// One column of an ordering.
#[derive(Debug, Clone)]
pub struct SortColumn {
    /// Field position.
    pub column: usize,
    /// Sort direction.
    pub direction: Direction,
    /// Value comparator.
    pub comparator: Comparator,
    /// Null placement.
    pub nulls: NullOrdering,
}

impl SortColumn {
    /// Ascending natural order on `column`.
    #[must_use]
    pub fn asc(column: usize) -> Self {
        Self { column, direction: Direction::Ascending, comparator: Comparator::Natural, nulls: NullOrdering::Low }
    }

    /// Descending natural order on `column`.
    #[must_use]
    pub fn desc(column: usize) -> Self {
        Self { direction: Direction::Descending, ..Self::asc(column) }
    }

    /// Replaces the comparator.
    #[must_use]
    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Sorts nulls above values.
    #[must_use]
    pub const fn nulls_high(mut self) -> Self {
        self.nulls = NullOrdering::High;
        self
    }

    /// Compares two values of this column, direction applied.
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        let null_low = match self.nulls {
            NullOrdering::Low => Ordering::Less,
            NullOrdering::High => Ordering::Greater,
        };
        let c = match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => null_low,
            (false, true) => null_low.reverse(),
            (false, false) => self.comparator.compare(a, b),
        };
        self.direction.apply(c)
    }
}

/// A multi-column ordering.
#[derive(Debug, Clone, Default)]
pub struct RowOrdering {
    columns: Vec<SortColumn>,
}

impl RowOrdering {
    /// Creates an empty ordering.
    #[must_use]
    pub const fn new() -> Self {
        Self { columns: Vec::new() }
    }

    /// Creates an ordering from columns.
    #[must_use]
    pub fn from_columns(columns: Vec<SortColumn>) -> Self {
        Self { columns }
    }

    /// Ascending natural order on each of the first `n` fields.
    #[must_use]
    pub fn ascending(n: usize) -> Self {
        Self { columns: (0..n).map(SortColumn::asc).collect() }
    }

    /// Appends a column.
    #[must_use]
    pub fn then(mut self, column: SortColumn) -> Self {
        self.columns.push(column);
        self
    }

    /// Returns the columns.
    #[must_use]
    pub fn columns(&self) -> &[SortColumn] {
        &self.columns
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns the direction of each column.
    #[must_use]
    pub fn directions(&self) -> Vec<Direction> {
        self.columns.iter().map(|c| c.direction).collect()
    }

    /// Returns true if every column has the same direction.
    #[must_use]
    pub fn is_unidirectional(&self) -> bool {
        self.columns.windows(2).all(|w| w[0].direction == w[1].direction)
    }

    /// Returns the ordering with every direction flipped.
    #[must_use]
    pub fn reverse(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| SortColumn { direction: c.direction.reverse(), ..c.clone() })
            .collect();
        Self { columns }
    }

    /// Returns this ordering followed by every field below `arity` it does
    /// not mention, ascending and natural.
    #[must_use]
    pub fn covering(&self, arity: usize) -> Self {
        let mut columns = self.columns.clone();
        for field in 0..arity {
            if !self.columns.iter().any(|c| c.column == field) {
                columns.push(SortColumn::asc(field));
            }
        }
        Self { columns }
    }

    /// Compares two rows.
    #[must_use]
    pub fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        self.compare_values(a.values(), b.values())
    }

    /// Compares two value tuples. Missing fields compare as null.
    #[must_use]
    pub fn compare_values(&self, a: &[Value], b: &[Value]) -> Ordering {
        self.compare_prefix(a, b, self.columns.len())
    }

    /// Compares two value tuples on the first `n` ordering columns.
    #[must_use]
    pub fn compare_prefix(&self, a: &[Value], b: &[Value], n: usize) -> Ordering {
        for column in self.columns.iter().take(n) {
            let x = a.get(column.column).unwrap_or(&Value::Null);
            let y = b.get(column.column).unwrap_or(&Value::Null);
            let c = column.compare(x, y);
            if c != Ordering::Equal {
                return c;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_insensitive_collation() {
        let ci = Comparator::case_insensitive();
        assert_eq!(ci.compare(&"ABC".into(), &"abc".into()), Ordering::Equal);
        assert_eq!(ci.compare(&"abc".into(), &"ABD".into()), Ordering::Less);
        assert_eq!(ci.compare(&Value::Null, &"a".into()), Ordering::Less);
        assert_eq!(Comparator::Natural.compare(&"ABC".into(), &"abc".into()), Ordering::Less);
    }

    #[test]
    fn default_collations() {
        let provider = DefaultCollations;
        assert!(provider.comparator("binary").is_some_and(|c| c.is_natural()));
        assert!(provider.comparator("case_insensitive").is_some_and(|c| !c.is_natural()));
        assert!(provider.comparator("klingon").is_none());
    }

    #[test]
    fn nulls_compare_low_before_direction() {
        let asc = SortColumn::asc(0);
        let desc = SortColumn::desc(0);
        let one = Value::Int(1);
        assert_eq!(asc.compare(&Value::Null, &one), Ordering::Less);
        assert_eq!(desc.compare(&Value::Null, &one), Ordering::Greater);
        assert_eq!(asc.clone().nulls_high().compare(&Value::Null, &one), Ordering::Greater);
    }

    #[test]
    fn mixed_ordering_compare_and_reverse() {
        let ordering = RowOrdering::new().then(SortColumn::asc(0)).then(SortColumn::desc(1));
        let a = [Value::Int(1), Value::Int(5)];
        let b = [Value::Int(1), Value::Int(7)];
        assert_eq!(ordering.compare_values(&a, &b), Ordering::Greater);
        assert_eq!(ordering.reverse().compare_values(&a, &b), Ordering::Less);
        assert!(!ordering.is_unidirectional());
        assert!(RowOrdering::ascending(3).is_unidirectional());
    }

    #[test]
    fn covering_appends_missing_fields() {
        let ordering = RowOrdering::new().then(SortColumn::desc(2)).covering(3);
        let fields: Vec<usize> = ordering.columns().iter().map(|c| c.column).collect();
        assert_eq!(fields, vec![2, 0, 1]);
    }
}
