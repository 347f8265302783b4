//! Positional query bindings.
//!
//! A [`QueryBindings`] set holds the runtime values a plan reads through
//! bound expressions: parameters supplied by the caller and rows bound by
//! an enclosing nested loop. A child set sees every entry of its parent
//! unless it rebinds the same position.

use std::collections::HashMap;
use std::sync::Arc;

use arbordb_core::{Row, Value};

use crate::error::{ExecError, ExecResult};

/// One bound entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A scalar parameter.
    Value(Value),
    /// A row bound by an outer loop.
    Row(Row),
}

/// A positional store of values and rows.
#[derive(Debug, Clone, Default)]
pub struct QueryBindings {
    parent: Option<Arc<QueryBindings>>,
    entries: HashMap<usize, Binding>,
}

impl QueryBindings {
    /// Creates an empty bindings set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a child set that inherits every entry of `parent`.
    #[must_use]
    pub fn child_of(parent: &Arc<Self>) -> Self {
        Self { parent: Some(Arc::clone(parent)), entries: HashMap::new() }
    }

    /// Binds a value at `position`.
    #[must_use]
    pub fn with_value(mut self, position: usize, value: impl Into<Value>) -> Self {
        self.set_value(position, value);
        self
    }

    /// Binds a row at `position`.
    #[must_use]
    pub fn with_row(mut self, position: usize, row: Row) -> Self {
        self.set_row(position, row);
        self
    }

    /// Binds a value at `position`, replacing any local entry.
    pub fn set_value(&mut self, position: usize, value: impl Into<Value>) {
        self.entries.insert(position, Binding::Value(value.into()));
    }

    /// Binds a row at `position`, replacing any local entry.
    pub fn set_row(&mut self, position: usize, row: Row) {
        self.entries.insert(position, Binding::Row(row));
    }

    /// Returns the entry at `position`, searching parents.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Binding> {
        match self.entries.get(&position) {
            Some(binding) => Some(binding),
            None => self.parent.as_deref().and_then(|p| p.get(position)),
        }
    }

    /// Returns the value bound at `position`.
    ///
    /// # Errors
    ///
    /// Fails if nothing is bound there or a row is bound instead.
    pub fn value(&self, position: usize) -> ExecResult<&Value> {
        match self.get(position) {
            Some(Binding::Value(value)) => Ok(value),
            Some(Binding::Row(_)) => {
                Err(ExecError::DataShape(format!("position {position} holds a row, not a value")))
            }
            None => Err(ExecError::UnboundParameter(position)),
        }
    }

    /// Returns the row bound at `position`.
    ///
    /// # Errors
    ///
    /// Fails if nothing is bound there or a value is bound instead.
    pub fn row(&self, position: usize) -> ExecResult<&Row> {
        match self.get(position) {
            Some(Binding::Row(row)) => Ok(row),
            Some(Binding::Value(_)) => {
                Err(ExecError::DataShape(format!("position {position} holds a value, not a row")))
            }
            None => Err(ExecError::UnboundParameter(position)),
        }
    }
}

/// A source of bindings sets, one per plan execution.
pub trait QueryBindingsCursor: Send {
    /// Returns the next bindings set, or `None` when done.
    fn next_bindings(&mut self) -> Option<Arc<QueryBindings>>;
}

/// Yields one bindings set once.
#[derive(Debug)]
pub struct SingletonBindingsCursor {
    bindings: Option<Arc<QueryBindings>>,
}

impl SingletonBindingsCursor {
    /// Creates a cursor yielding `bindings`.
    #[must_use]
    pub fn new(bindings: QueryBindings) -> Self {
        Self { bindings: Some(Arc::new(bindings)) }
    }
}

impl QueryBindingsCursor for SingletonBindingsCursor {
    fn next_bindings(&mut self) -> Option<Arc<QueryBindings>> {
        self.bindings.take()
    }
}

/// Yields a fixed list of bindings sets in order.
#[derive(Debug)]
pub struct MultipleBindingsCursor {
    pending: std::vec::IntoIter<Arc<QueryBindings>>,
}

impl MultipleBindingsCursor {
    /// Creates a cursor over `bindings`.
    #[must_use]
    pub fn new(bindings: Vec<QueryBindings>) -> Self {
        Self { pending: bindings.into_iter().map(Arc::new).collect::<Vec<_>>().into_iter() }
    }
}

impl QueryBindingsCursor for MultipleBindingsCursor {
    fn next_bindings(&mut self) -> Option<Arc<QueryBindings>> {
        self.pending.next()
    }
}
