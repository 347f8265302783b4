//! Core data types: values, hierarchical keys, rows and row types.

mod hkey;
mod row;
mod value;

pub use hkey::{HKey, HKeySegment};
pub use row::{Field, Row, RowKind, RowOverlay, RowType, ValueType};
pub use value::{compare_value_slices, compare_values, Value};

#[cfg(test)]
mod proptest_tests;
