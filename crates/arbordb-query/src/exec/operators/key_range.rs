//! Index key ranges.
//!
//! An [`IndexKeyRange`] bounds an index scan by a prefix of the index's
//! columns. All bound columns but the last are equalities; the last may be
//! an inequality on either or both sides. Bound values are
//! [`BoundExpr`]s, so a range can read parameters and outer rows that are
//! only known when the scan opens.
//!
//! Nulls sort low, and a null endpoint on the last column means:
//!
//! | bound      | meaning                                   |
//! |------------|-------------------------------------------|
//! | `>= null`  | no lower bound                            |
//! | `> null`   | every non-null value                      |
//! | `< null`   | no upper bound                            |
//! | `<= null`  | only with `>= null`: match only nulls     |

use std::cmp::Ordering;

use arbordb_core::{compare_values, Value};

use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;

/// A value in a bound, resolved when the scan opens.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    /// A constant.
    Literal(Value),
    /// The value bound at a position.
    Parameter(usize),
    /// A field of the row bound at a position.
    BoundField {
        /// Binding position of the row.
        row: usize,
        /// Field within the row.
        field: usize,
    },
}

impl BoundExpr {
    /// Evaluates against `bindings`.
    pub fn evaluate(&self, bindings: &QueryBindings) -> ExecResult<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Parameter(position) => bindings.value(*position).cloned(),
            Self::BoundField { row, field } => bindings.row(*row)?.value(*field).cloned().ok_or_else(|| {
                ExecError::DataShape(format!("bound row at position {row} has no field {field}"))
            }),
        }
    }

    /// Returns true for literals.
    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl From<Value> for BoundExpr {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

macro_rules! literal_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for BoundExpr {
            fn from(value: $ty) -> Self {
                Self::Literal(Value::from(value))
            }
        })*
    };
}

literal_from!(bool, i64, i32, f64, &str, String);

/// One end of a range: values for a prefix of the index columns.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBound {
    values: Vec<BoundExpr>,
    inclusive: bool,
}

impl IndexBound {
    /// Creates a bound.
    #[must_use]
    pub fn new(values: Vec<BoundExpr>, inclusive: bool) -> Self {
        Self { values, inclusive }
    }

    /// An inclusive bound.
    pub fn inclusive<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<BoundExpr>,
    {
        Self::new(values.into_iter().map(Into::into).collect(), true)
    }

    /// An exclusive bound.
    pub fn exclusive<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<BoundExpr>,
    {
        Self::new(values.into_iter().map(Into::into).collect(), false)
    }

    /// Returns the bound expressions.
    #[must_use]
    pub fn values(&self) -> &[BoundExpr] {
        &self.values
    }

    /// Returns true if the bound includes its endpoint.
    #[must_use]
    pub const fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    fn evaluate(&self, bindings: &QueryBindings) -> ExecResult<Vec<Value>> {
        self.values.iter().map(|v| v.evaluate(bindings)).collect()
    }
}

/// A key range over the leading columns of an index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexKeyRange {
    lo: Option<IndexBound>,
    hi: Option<IndexBound>,
}

impl IndexKeyRange {
    /// The range covering the whole index.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Creates a range.
    ///
    /// Shape is checked here. Null rules and equality of the leading
    /// columns are checked here too when every value is a literal, and at
    /// open otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidArgument`] for an empty bound, bounds of
    /// different lengths, more than one inequality column, or a misplaced
    /// inclusive-null upper bound.
    pub fn new(lo: Option<IndexBound>, hi: Option<IndexBound>) -> ExecResult<Self> {
        for bound in lo.iter().chain(hi.iter()) {
            if bound.values.is_empty() {
                return Err(ExecError::invalid_argument("an index bound must name at least one column"));
            }
        }
        if let (Some(lo), Some(hi)) = (&lo, &hi) {
            if lo.values.len() != hi.values.len() {
                return Err(ExecError::invalid_argument(format!(
                    "lower bound covers {} columns but upper bound covers {}",
                    lo.values.len(),
                    hi.values.len()
                )));
            }
        }
        let range = Self { lo, hi };
        if range.is_literal() {
            range.resolve(&QueryBindings::new())?;
        }
        Ok(range)
    }

    /// A range with both ends.
    pub fn between(lo: IndexBound, hi: IndexBound) -> ExecResult<Self> {
        Self::new(Some(lo), Some(hi))
    }

    /// A range with only a lower end.
    pub fn starting_at(lo: IndexBound) -> ExecResult<Self> {
        Self::new(Some(lo), None)
    }

    /// A range with only an upper end.
    pub fn ending_at(hi: IndexBound) -> ExecResult<Self> {
        Self::new(None, Some(hi))
    }

    /// Every column equal to `values`.
    pub fn equal<I, V>(values: I) -> ExecResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<BoundExpr>,
    {
        let bound = IndexBound::inclusive(values);
        Self::new(Some(bound.clone()), Some(bound))
    }

    /// Returns the lower bound.
    #[must_use]
    pub const fn lo(&self) -> Option<&IndexBound> {
        self.lo.as_ref()
    }

    /// Returns the upper bound.
    #[must_use]
    pub const fn hi(&self) -> Option<&IndexBound> {
        self.hi.as_ref()
    }

    /// Returns the number of bound columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.lo.as_ref().or(self.hi.as_ref()).map_or(0, |b| b.values.len())
    }

    fn is_literal(&self) -> bool {
        self.lo.iter().chain(self.hi.iter()).flat_map(|b| &b.values).all(BoundExpr::is_literal)
    }

    /// Evaluates the bounds and checks the rules that depend on values.
    pub(crate) fn resolve(&self, bindings: &QueryBindings) -> ExecResult<ResolvedRange> {
        let lo = self.lo.as_ref().map(|b| b.evaluate(bindings).map(|v| (v, b.inclusive))).transpose()?;
        let hi = self.hi.as_ref().map(|b| b.evaluate(bindings).map(|v| (v, b.inclusive))).transpose()?;

        let (equalities, lo, hi) = match (lo, hi) {
            (None, None) => return Ok(ResolvedRange::default()),
            (Some((mut lo, lo_inc)), Some((mut hi, hi_inc))) => {
                let last = lo.len() - 1;
                if let Some(column) =
                    (0..last).find(|&i| compare_values(&lo[i], &hi[i]) != Ordering::Equal)
                {
                    return Err(ExecError::invalid_argument(format!(
                        "columns {column} and {last} are both inequalities; only the last bound column may be one"
                    )));
                }
                let lo_last = lo.pop().map(|v| (v, lo_inc));
                let hi_last = hi.pop().map(|v| (v, hi_inc));
                (lo, lo_last, hi_last)
            }
            (Some((mut lo, inclusive)), None) => {
                let last = lo.pop().map(|v| (v, inclusive));
                (lo, last, None)
            }
            (None, Some((mut hi, inclusive))) => {
                let last = hi.pop().map(|v| (v, inclusive));
                (hi, None, last)
            }
        };

        let hi = match hi {
            // `< null` has nothing below it under nulls-low, so it is read as no bound.
            Some((Value::Null, false)) => None,
            Some((Value::Null, true)) => match &lo {
                Some((Value::Null, true)) => Some((Value::Null, true)),
                _ => {
                    return Err(ExecError::invalid_argument(
                        "an inclusive null upper bound requires an inclusive null lower bound",
                    ))
                }
            },
            other => other,
        };

        let column = equalities.len();
        Ok(ResolvedRange { equalities, last: Some(LastColumn { column, lo, hi }) })
    }
}

/// A range with all values known.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct ResolvedRange {
    /// Values of the leading equality columns.
    pub equalities: Vec<Value>,
    /// Bounds of the column after them.
    pub last: Option<LastColumn>,
}

impl ResolvedRange {
    /// Returns the number of constrained columns.
    pub fn width(&self) -> usize {
        self.equalities.len() + usize::from(self.last.is_some())
    }

    /// Returns the `(value, inclusive)` lower and upper bounds of `column`.
    #[allow(clippy::type_complexity)]
    pub fn bounds(&self, column: usize) -> (Option<(&Value, bool)>, Option<(&Value, bool)>) {
        if let Some(value) = self.equalities.get(column) {
            return (Some((value, true)), Some((value, true)));
        }
        match &self.last {
            Some(last) if last.column == column => (
                last.lo.as_ref().map(|(v, inc)| (v, *inc)),
                last.hi.as_ref().map(|(v, inc)| (v, *inc)),
            ),
            _ => (None, None),
        }
    }
}

/// Bounds on the last constrained column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LastColumn {
    pub column: usize,
    pub lo: Option<(Value, bool)>,
    pub hi: Option<(Value, bool)>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn resolve(range: &IndexKeyRange) -> ResolvedRange {
        range.resolve(&QueryBindings::new()).unwrap()
    }

    #[test]
    fn equality_prefix_and_inequality() {
        let range = IndexKeyRange::between(IndexBound::inclusive([1i64, 11]), IndexBound::exclusive([1i64, 15])).unwrap();
        let resolved = resolve(&range);
        assert_eq!(resolved.equalities, vec![Value::Int(1)]);
        assert_eq!(resolved.width(), 2);
        assert_eq!(resolved.bounds(1), (Some((&Value::Int(11), true)), Some((&Value::Int(15), false))));
        assert_eq!(resolved.bounds(0), (Some((&Value::Int(1), true)), Some((&Value::Int(1), true))));
        assert_eq!(resolved.bounds(2), (None, None));
    }

    #[test]
    fn one_sided_bound_fixes_leading_columns() {
        let range = IndexKeyRange::starting_at(IndexBound::exclusive([3i64, 7])).unwrap();
        let resolved = resolve(&range);
        assert_eq!(resolved.equalities, vec![Value::Int(3)]);
        assert_eq!(resolved.bounds(1), (Some((&Value::Int(7), false)), None));
    }

    #[test]
    fn two_inequalities_are_rejected() {
        let err = IndexKeyRange::between(IndexBound::inclusive([1i64, 5]), IndexBound::inclusive([2i64, 7])).unwrap_err();
        assert!(matches!(err, ExecError::InvalidArgument(_)));
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let err = IndexKeyRange::between(IndexBound::inclusive([1i64]), IndexBound::inclusive([1i64, 5])).unwrap_err();
        assert!(matches!(err, ExecError::InvalidArgument(_)));
        let err = IndexKeyRange::starting_at(IndexBound::inclusive(Vec::<Value>::new())).unwrap_err();
        assert!(matches!(err, ExecError::InvalidArgument(_)));
    }

    #[test]
    fn null_bound_rules() {
        // > null, <= null
        assert!(IndexKeyRange::between(IndexBound::exclusive([Value::Null]), IndexBound::inclusive([Value::Null])).is_err());
        // >= 5, <= null
        assert!(IndexKeyRange::between(IndexBound::inclusive([5i64]), IndexBound::inclusive([Value::Null])).is_err());
        // <= null alone
        assert!(IndexKeyRange::ending_at(IndexBound::inclusive([Value::Null])).is_err());

        // >= null, <= null matches only nulls
        let only_nulls =
            IndexKeyRange::between(IndexBound::inclusive([Value::Null]), IndexBound::inclusive([Value::Null])).unwrap();
        assert_eq!(resolve(&only_nulls).bounds(0), (Some((&Value::Null, true)), Some((&Value::Null, true))));

        // < null is no upper bound
        let open_above = IndexKeyRange::between(IndexBound::exclusive([Value::Null]), IndexBound::exclusive([Value::Null])).unwrap();
        assert_eq!(resolve(&open_above).bounds(0), (Some((&Value::Null, false)), None));
    }

    #[test]
    fn parameters_resolve_at_open() {
        let range = IndexKeyRange::between(
            IndexBound::new(vec![BoundExpr::Parameter(0)], true),
            IndexBound::new(vec![BoundExpr::Parameter(1)], true),
        )
        .unwrap();

        assert!(matches!(range.resolve(&QueryBindings::new()), Err(ExecError::UnboundParameter(0))));

        let bindings = QueryBindings::new().with_value(0, 5i64).with_value(1, Value::Null);
        assert!(matches!(range.resolve(&bindings), Err(ExecError::InvalidArgument(_))));

        let bindings = QueryBindings::new().with_value(0, 5i64).with_value(1, 9i64);
        assert_eq!(range.resolve(&bindings).unwrap().bounds(0), (Some((&Value::Int(5), true)), Some((&Value::Int(9), true))));
    }

    #[test]
    fn unbounded_has_no_columns() {
        assert_eq!(resolve(&IndexKeyRange::unbounded()).width(), 0);
        assert_eq!(IndexKeyRange::unbounded().width(), 0);
    }
}
