//! Flatten: joins hkey-adjacent parent and child rows.
//!
//! The input is one hkey-ordered stream in which parent rows, child rows and
//! rows of other types are interleaved, as a group scan produces them. Each
//! child that descends from the buffered parent yields a combined row
//! (parent fields followed by child fields) carrying the child's hkey.
//!
//! Outer joins fill the missing side with nulls:
//!
//! - A childless parent under LEFT or FULL yields one combined row whose
//!   hkey is the parent's extended by a null child segment. The row is
//!   emitted as soon as the input shows no child can follow, so it lands
//!   where a real child would have been.
//! - A child with no buffered ancestor parent under RIGHT or FULL yields a
//!   combined row with null parent fields.
//!
//! Input that is not hkey-ordered is a caller error and is not detected.

use std::collections::VecDeque;
use std::sync::Arc;

use arbordb_core::catalog::Group;
use arbordb_core::{HKey, Row, RowType, Value};

use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{pull, BoxedCursor, Cursor, CursorBase, CursorState};

/// Join semantics of a [`Flatten`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Only parents with children and children with parents.
    Inner,
    /// Childless parents are kept.
    Left,
    /// Orphan children are kept.
    Right,
    /// Both.
    Full,
}

impl JoinType {
    /// Returns true if unmatched parents produce a row.
    #[must_use]
    pub const fn keeps_parents(self) -> bool {
        matches!(self, Self::Left | Self::Full)
    }

    /// Returns true if unmatched children produce a row.
    #[must_use]
    pub const fn keeps_children(self) -> bool {
        matches!(self, Self::Right | Self::Full)
    }
}

/// Output options of a [`Flatten`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlattenOptions {
    keep_parent: bool,
    keep_child: bool,
    left_join_shortens_hkey: bool,
}

impl FlattenOptions {
    /// No options set.
    #[must_use]
    pub const fn new() -> Self {
        Self { keep_parent: false, keep_child: false, left_join_shortens_hkey: false }
    }

    /// Also emits each parent row itself.
    #[must_use]
    pub const fn keep_parent(mut self) -> Self {
        self.keep_parent = true;
        self
    }

    /// Also emits each child row itself, before its combined row.
    #[must_use]
    pub const fn keep_child(mut self) -> Self {
        self.keep_child = true;
        self
    }

    /// Gives null-child rows the parent's hkey instead of an extended one.
    #[must_use]
    pub const fn left_join_shortens_hkey(mut self) -> Self {
        self.left_join_shortens_hkey = true;
        self
    }
}

/// Combines parent and child rows of one hkey-ordered stream.
pub struct Flatten {
    base: CursorBase,
    input: BoxedCursor,
    parent_type: Arc<RowType>,
    child_type: Arc<RowType>,
    child_ordinal: u32,
    join: JoinType,
    options: FlattenOptions,
    /// The most recent parent, while later rows may still descend from it.
    parent: Option<Row>,
    /// Where a null child of `parent` would sit.
    left_join_position: HKey,
    childless: bool,
    input_done: bool,
    pending: VecDeque<Row>,
}

impl Flatten {
    /// Creates a flatten of `parent_type` and `child_type` rows from `input`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidArgument`] unless `child_type`'s table is
    /// a child of `parent_type`'s table in `group`.
    pub fn new(
        group: &Group,
        input: BoxedCursor,
        parent_type: Arc<RowType>,
        child_type: Arc<RowType>,
        join: JoinType,
        options: FlattenOptions,
    ) -> ExecResult<Self> {
        let parent_ordinal = parent_type.hkey_table_ordinal();
        let child_ordinal = child_type
            .hkey_table_ordinal()
            .ok_or_else(|| ExecError::invalid_argument(format!("{} has no table in group {}", child_type, group.name())))?;
        let child_table = group
            .table_by_ordinal(child_ordinal)
            .ok_or_else(|| ExecError::invalid_argument(format!("{} has no table in group {}", child_type, group.name())))?;
        let parent_of_child = match child_table.parent() {
            Some(position) => Some(group.table_at(position)?.ordinal()),
            None => None,
        };
        if parent_ordinal.is_none() || parent_of_child != parent_ordinal {
            return Err(ExecError::invalid_argument(format!(
                "{} is not the parent of {}",
                parent_type.name(),
                child_type.name()
            )));
        }

        let row_type = RowType::flattened(&parent_type, &child_type);
        Ok(Self {
            base: CursorBase::new("Flatten", row_type),
            input,
            parent_type,
            child_type,
            child_ordinal,
            join,
            options,
            parent: None,
            left_join_position: HKey::empty(),
            childless: false,
            input_done: false,
            pending: VecDeque::new(),
        })
    }

    /// Returns the join type.
    #[must_use]
    pub const fn join_type(&self) -> JoinType {
        self.join
    }

    fn set_parent(&mut self, parent: Option<Row>) {
        if let Some(row) = &parent {
            self.left_join_position = row.hkey().extend_with_null(self.child_ordinal);
            self.childless = true;
        }
        self.parent = parent;
    }

    fn ready_for_left_join_row(&self, next: Option<&Row>) -> bool {
        let Some(parent) = &self.parent else {
            return false;
        };
        if !self.join.keeps_parents() || !self.childless {
            return false;
        }
        match next {
            None => true,
            Some(row) if row.row_type().same_as(&self.parent_type) => true,
            Some(row) if !parent.is_ancestor_of(row) => true,
            Some(row) if row.row_type().same_as(&self.child_type) => false,
            // A descendant of another type: it precedes the null child only
            // if it sorts before it.
            Some(row) => self.left_join_position < *row.hkey(),
        }
    }

    fn combine(&self, parent: Option<&Row>, child: Option<&Row>, hkey: HKey) -> ExecResult<Row> {
        let row_type = self.base.row_type();
        let mut values = Vec::with_capacity(row_type.arity());
        match parent {
            Some(p) => values.extend_from_slice(p.values()),
            None => values.resize(self.parent_type.arity(), Value::Null),
        }
        match child {
            Some(c) => values.extend_from_slice(c.values()),
            None => values.resize(row_type.arity(), Value::Null),
        }
        Ok(Row::new(row_type, values, hkey)?)
    }

    fn emit_left_join_row(&mut self) -> ExecResult<()> {
        if let Some(parent) = &self.parent {
            let hkey = if self.options.left_join_shortens_hkey {
                parent.hkey().clone()
            } else {
                self.left_join_position.clone()
            };
            let row = self.combine(Some(parent), None, hkey)?;
            self.pending.push_back(row);
            self.childless = false;
        }
        Ok(())
    }

    fn accept(&mut self, row: Row) -> ExecResult<()> {
        if row.row_type().same_as(&self.parent_type) {
            if self.options.keep_parent {
                self.pending.push_back(row.clone());
            }
            self.set_parent(Some(row));
        } else if row.row_type().same_as(&self.child_type) {
            if self.options.keep_child {
                self.pending.push_back(row.clone());
            }
            match &self.parent {
                Some(parent) if parent.is_ancestor_of(&row) => {
                    let combined = self.combine(Some(parent), Some(&row), row.hkey().clone())?;
                    self.pending.push_back(combined);
                    self.childless = false;
                }
                _ => {
                    self.set_parent(None);
                    if self.join.keeps_children() {
                        let combined = self.combine(None, Some(&row), row.hkey().clone())?;
                        self.pending.push_back(combined);
                    }
                }
            }
        } else {
            self.pending.push_back(row);
        }
        Ok(())
    }
}

impl Cursor for Flatten {
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
        self.parent = None;
        self.childless = false;
        self.input_done = false;
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(self.base.produced(row)));
            }
            if self.input_done {
                self.close()?;
                return Ok(None);
            }
            let row = pull(&mut self.input)?;
            if self.ready_for_left_join_row(row.as_ref()) {
                self.emit_left_join_row()?;
            }
            match row {
                Some(row) => self.accept(row)?,
                None => {
                    self.set_parent(None);
                    self.input_done = true;
                }
            }
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.set_closed() {
            self.input.close()?;
        }
        self.pending.clear();
        self.parent = None;
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "Flatten"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arbordb_core::catalog::GroupBuilder;
    use arbordb_core::{Field, ValueType};
    use arbordb_storage::MemoryStore;

    use crate::exec::operators::group_scan::GroupScan;

    fn fixture(rows: Vec<(&str, Vec<Value>)>) -> (Arc<ExecutionContext>, Arc<Group>) {
        let group = GroupBuilder::new("co")
            .root("customer", vec![Field::not_null("cid", ValueType::Int)], &["cid"])
            .child(
                "order",
                "customer",
                vec![Field::not_null("oid", ValueType::Int), Field::new("cid", ValueType::Int)],
                &["oid"],
                &["cid"],
            )
            .build()
            .unwrap();
        let mut store = MemoryStore::new(Arc::clone(&group));
        store.insert_all(rows).unwrap();
        (Arc::new(ExecutionContext::new().with_store(Arc::new(store))), group)
    }

    fn flatten(group: &Arc<Group>, join: JoinType, options: FlattenOptions) -> Flatten {
        Flatten::new(
            group,
            Box::new(GroupScan::new(group)),
            group.row_type("customer").unwrap(),
            group.row_type("order").unwrap(),
            join,
            options,
        )
        .unwrap()
    }

    /// Renders each row as `type(values)`.
    fn render(cursor: &mut dyn Cursor) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            let values: Vec<String> = row.values().iter().map(ToString::to_string).collect();
            let name = if row.row_type().is_table() { row.row_type().name() } else { "f" };
            out.push(format!("{name}({})", values.join(",")));
        }
        out
    }

    fn standard() -> Vec<(&'static str, Vec<Value>)> {
        vec![
            ("customer", vec![Value::Int(1)]),
            ("order", vec![Value::Int(10), Value::Int(1)]),
            ("order", vec![Value::Int(11), Value::Int(1)]),
            ("customer", vec![Value::Int(2)]),
            ("customer", vec![Value::Int(3)]),
            // Orphan of a missing customer 4.
            ("order", vec![Value::Int(40), Value::Int(4)]),
        ]
    }

    #[test]
    fn inner_join() {
        let (ctx, group) = fixture(standard());
        let mut op = flatten(&group, JoinType::Inner, FlattenOptions::new());
        op.open_top_level(&ctx).unwrap();
        assert_eq!(render(&mut op), vec!["f(1,10,1)", "f(1,11,1)"]);
        op.close_top_level().unwrap();
    }

    #[test]
    fn left_join_keeps_childless_parents() {
        let (ctx, group) = fixture(standard());
        let mut op = flatten(&group, JoinType::Left, FlattenOptions::new());
        op.open_top_level(&ctx).unwrap();
        assert_eq!(render(&mut op), vec!["f(1,10,1)", "f(1,11,1)", "f(2,NULL,NULL)", "f(3,NULL,NULL)"]);
        op.close_top_level().unwrap();
    }

    #[test]
    fn right_and_full_keep_orphans() {
        let (ctx, group) = fixture(standard());
        let mut right = flatten(&group, JoinType::Right, FlattenOptions::new());
        right.open_top_level(&ctx).unwrap();
        assert_eq!(render(&mut right), vec!["f(1,10,1)", "f(1,11,1)", "f(NULL,40,4)"]);

        let mut full = flatten(&group, JoinType::Full, FlattenOptions::new());
        full.open_top_level(&ctx).unwrap();
        assert_eq!(
            render(&mut full),
            vec!["f(1,10,1)", "f(1,11,1)", "f(2,NULL,NULL)", "f(3,NULL,NULL)", "f(NULL,40,4)"]
        );
    }

    #[test]
    fn kept_rows_interleave() {
        let (ctx, group) = fixture(standard());
        let options = FlattenOptions::new().keep_parent().keep_child();
        let mut op = flatten(&group, JoinType::Left, options);
        op.open_top_level(&ctx).unwrap();
        assert_eq!(
            render(&mut op),
            vec![
                "customer(1)",
                "order(10,1)",
                "f(1,10,1)",
                "order(11,1)",
                "f(1,11,1)",
                "customer(2)",
                "f(2,NULL,NULL)",
                "customer(3)",
                "f(3,NULL,NULL)",
                "order(40,4)",
            ]
        );
    }

    #[test]
    fn left_join_hkeys() {
        let (ctx, group) = fixture(vec![("customer", vec![Value::Int(2)])]);
        let parent = HKey::root(1, vec![Value::Int(2)]);

        let mut op = flatten(&group, JoinType::Left, FlattenOptions::new());
        op.open_top_level(&ctx).unwrap();
        assert_eq!(op.next().unwrap().unwrap().hkey(), &parent.extend_with_null(2));

        let mut shortened = flatten(&group, JoinType::Left, FlattenOptions::new().left_join_shortens_hkey());
        shortened.open_top_level(&ctx).unwrap();
        assert_eq!(shortened.next().unwrap().unwrap().hkey(), &parent);
    }

    #[test]
    fn empty_input() {
        let (ctx, group) = fixture(Vec::new());
        let mut op = flatten(&group, JoinType::Full, FlattenOptions::new());
        op.open_top_level(&ctx).unwrap();
        assert!(op.next().unwrap().is_none());
        assert!(op.state().is_closed());
    }

    #[test]
    fn unrelated_types_are_rejected() {
        let (_, group) = fixture(Vec::new());
        let result = Flatten::new(
            &group,
            Box::new(GroupScan::new(&group)),
            group.row_type("order").unwrap(),
            group.row_type("customer").unwrap(),
            JoinType::Inner,
            FlattenOptions::new(),
        );
        assert!(matches!(result, Err(ExecError::InvalidArgument(_))));
    }
}
