//! Rows and row types.
//!
//! A [`Row`] is an immutable snapshot: an [`Arc`]-shared value tuple tagged
//! with its [`RowType`] and its [`HKey`]. Producers never reuse a row's
//! storage, so a consumer may keep a row past the next pull. Building a
//! modified copy (a jump target, for instance) goes through [`RowOverlay`],
//! which freezes into a new row.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::hkey::HKey;
use super::value::Value;
use crate::error::{CoreError, CoreResult};

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Any value.
    Any,
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// Floating point (accepts integers).
    Float,
    /// Exact decimal (accepts integers).
    Decimal,
    /// String.
    String,
    /// Bytes.
    Bytes,
    /// Spatial point.
    Point,
}

impl ValueType {
    /// Returns true if `value` is a valid non-null instance of this type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Any, _)
                | (Self::Bool, Value::Bool(_))
                | (Self::Int, Value::Int(_))
                | (Self::Float, Value::Float(_) | Value::Int(_))
                | (Self::Decimal, Value::Decimal(_) | Value::Int(_))
                | (Self::String, Value::String(_))
                | (Self::Bytes, Value::Bytes(_))
                | (Self::Point, Value::Point { .. })
        )
    }
}

/// A named, typed field of a row type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Declared type.
    pub value_type: ValueType,
    /// Whether nulls are allowed.
    pub nullable: bool,
}

impl Field {
    /// Creates a nullable field.
    #[must_use]
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self { name: name.into(), value_type, nullable: true }
    }

    /// Creates a non-nullable field.
    #[must_use]
    pub fn not_null(name: impl Into<String>, value_type: ValueType) -> Self {
        Self { name: name.into(), value_type, nullable: false }
    }

    /// Returns a nullable copy of this field.
    #[must_use]
    pub fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            self.nullable
        } else {
            self.value_type.accepts(value)
        }
    }
}

/// What a row type describes.
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    /// One physical table's columns.
    Table {
        /// The table's ordinal within its group.
        ordinal: u32,
        /// Depth of the table in its group (root is 0).
        depth: usize,
    },
    /// An index's composition.
    Index {
        /// Index name.
        index: String,
        /// Ordinal of the table (leaf table for group indexes) whose hkey the row carries.
        table_ordinal: u32,
    },
    /// A composite of a parent and a child row.
    Flattened {
        /// Parent row type.
        parent: Arc<RowType>,
        /// Child row type.
        child: Arc<RowType>,
    },
    /// Any other shape.
    Derived,
}

/// The shape of a row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowType {
    name: String,
    kind: RowKind,
    fields: Vec<Field>,
}

impl RowType {
    /// Creates a row type.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: RowKind, fields: Vec<Field>) -> Self {
        Self { name: name.into(), kind, fields }
    }

    /// Creates a derived row type.
    #[must_use]
    pub fn derived(name: impl Into<String>, fields: Vec<Field>) -> Arc<Self> {
        Arc::new(Self::new(name, RowKind::Derived, fields))
    }

    /// Creates the composite type of `parent` followed by `child`.
    ///
    /// All fields become nullable since either side may be null-filled.
    #[must_use]
    pub fn flattened(parent: &Arc<Self>, child: &Arc<Self>) -> Arc<Self> {
        let fields =
            parent.fields.iter().chain(&child.fields).cloned().map(Field::into_nullable).collect();
        Arc::new(Self::new(
            format!("flatten({}, {})", parent.name, child.name),
            RowKind::Flattened { parent: Arc::clone(parent), child: Arc::clone(child) },
            fields,
        ))
    }

    /// Returns the name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind.
    #[must_use]
    pub const fn kind(&self) -> &RowKind {
        &self.kind
    }

    /// Returns the fields.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Returns true for table row types.
    #[must_use]
    pub const fn is_table(&self) -> bool {
        matches!(self.kind, RowKind::Table { .. })
    }

    /// Returns true for index row types.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self.kind, RowKind::Index { .. })
    }

    /// Returns the table depth for table row types.
    #[must_use]
    pub const fn table_depth(&self) -> Option<usize> {
        match self.kind {
            RowKind::Table { depth, .. } => Some(depth),
            _ => None,
        }
    }

    /// Returns the ordinal of the table whose hkey rows of this type carry.
    #[must_use]
    pub fn hkey_table_ordinal(&self) -> Option<u32> {
        match &self.kind {
            RowKind::Table { ordinal, .. } => Some(*ordinal),
            RowKind::Index { table_ordinal, .. } => Some(*table_ordinal),
            RowKind::Flattened { child, .. } => child.hkey_table_ordinal(),
            RowKind::Derived => None,
        }
    }

    /// Returns true if both handles describe the same row type.
    #[must_use]
    pub fn same_as(self: &Arc<Self>, other: &Arc<Self>) -> bool {
        Arc::ptr_eq(self, other) || **self == **other
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field.name)?;
        }
        write!(f, ")")
    }
}

/// An immutable row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    row_type: Arc<RowType>,
    values: Arc<[Value]>,
    hkey: HKey,
}

impl Row {
    /// Creates a row, checking arity and field types against `row_type`.
    pub fn new(row_type: Arc<RowType>, values: Vec<Value>, hkey: HKey) -> CoreResult<Self> {
        if values.len() != row_type.arity() {
            return Err(CoreError::data_shape(
                format!("{} fields for {}", row_type.arity(), row_type.name()),
                format!("{} fields", values.len()),
            ));
        }
        for (field, value) in row_type.fields().iter().zip(&values) {
            if !field.accepts(value) {
                return Err(CoreError::data_shape_with_value(
                    format!("{:?} for field {}", field.value_type, field.name),
                    value.kind_name(),
                    value,
                ));
            }
        }
        Ok(Self { row_type, values: values.into(), hkey })
    }

    /// Returns the row type.
    #[must_use]
    pub const fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// Returns the value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns all values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the hkey.
    #[must_use]
    pub const fn hkey(&self) -> &HKey {
        &self.hkey
    }

    /// Returns true if this row's hkey is a proper prefix of `other`'s.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.hkey.is_ancestor_of(&other.hkey)
    }

    /// Starts an editable copy of this row.
    #[must_use]
    pub fn overlay(&self) -> RowOverlay {
        RowOverlay {
            row_type: Arc::clone(&self.row_type),
            values: self.values.to_vec(),
            hkey: self.hkey.clone(),
        }
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.row_type.name())?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{value}")?;
        }
        write!(f, "]")
    }
}

/// A mutable copy of a row.
#[derive(Debug, Clone)]
pub struct RowOverlay {
    row_type: Arc<RowType>,
    values: Vec<Value>,
    hkey: HKey,
}

impl RowOverlay {
    /// Creates an all-null overlay of `row_type`.
    #[must_use]
    pub fn nulls(row_type: Arc<RowType>) -> Self {
        let values = vec![Value::Null; row_type.arity()];
        Self { row_type, values, hkey: HKey::empty() }
    }

    /// Replaces the value at `index`.
    pub fn set(&mut self, index: usize, value: Value) -> CoreResult<&mut Self> {
        let arity = self.values.len();
        let slot = self.values.get_mut(index).ok_or_else(|| {
            CoreError::data_shape(format!("field index < {arity}"), index.to_string())
        })?;
        *slot = value;
        Ok(self)
    }

    /// Sets every field from `index` onward to null.
    pub fn null_from(&mut self, index: usize) -> &mut Self {
        for value in self.values.iter_mut().skip(index) {
            *value = Value::Null;
        }
        self
    }

    /// Replaces the hkey.
    pub fn set_hkey(&mut self, hkey: HKey) -> &mut Self {
        self.hkey = hkey;
        self
    }

    /// Freezes into an immutable row.
    ///
    /// Field types are not rechecked: an overlay may be a probe row (a jump
    /// target) with nulls in fields real rows never leave null.
    #[must_use]
    pub fn freeze(self) -> Row {
        Row { row_type: self.row_type, values: self.values.into(), hkey: self.hkey }
    }
}
