//! Group scan: every row of a group in hkey order.

use std::sync::Arc;

use arbordb_core::catalog::Group;
use arbordb_core::{HKey, Row, RowType};
use arbordb_storage::{SeekMode, SeekTarget, StoreCursor};

use crate::error::ExecResult;
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{ColumnSelector, Cursor, CursorBase, CursorState};

/// Scans a whole group, or the subtree under one hkey, in hkey order.
///
/// Rows of every table in the group are interleaved, so the cursor's own
/// row type is a field-less placeholder named after the group. `jump`
/// seeks to the target row's hkey and ignores the selector.
pub struct GroupScan {
    base: CursorBase,
    subtree: Option<HKey>,
    store: Option<Box<dyn StoreCursor>>,
    pending: Option<Row>,
}

impl GroupScan {
    /// Creates a scan of `group`.
    #[must_use]
    pub fn new(group: &Group) -> Self {
        let row_type = RowType::derived(group.name(), Vec::new());
        Self { base: CursorBase::new("GroupScan", row_type), subtree: None, store: None, pending: None }
    }

    /// Restricts the scan to `root` and its descendants.
    #[must_use]
    pub fn subtree(mut self, root: HKey) -> Self {
        self.subtree = Some(root);
        self
    }

    fn in_scope(&self, row: &Row) -> bool {
        self.subtree.as_ref().map_or(true, |root| root.is_prefix_of(row.hkey()))
    }
}

impl Cursor for GroupScan {
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
        let mut store = self.base.ctx()?.store()?.group_cursor()?;
        self.pending = match &self.subtree {
            Some(root) => store.seek(SeekTarget::HKey(root), SeekMode::AtOrAfter)?,
            None => store.seek_first()?,
        };
        self.store = Some(store);
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        self.base.ctx()?.check_cancelled()?;
        let row = match self.pending.take() {
            Some(row) => Some(row),
            None => match self.store.as_mut() {
                Some(store) => store.next()?,
                None => None,
            },
        };
        match row.filter(|r| self.in_scope(r)) {
            Some(row) => {
                self.base.ctx()?.record_rows_read(1);
                Ok(Some(self.base.produced(row)))
            }
            None => {
                self.close()?;
                Ok(None)
            }
        }
    }

    fn jump(&mut self, target: &Row, _selector: ColumnSelector) -> ExecResult<()> {
        self.base.check_active("jump")?;
        self.base.ctx()?.record_jump();
        let hkey = match &self.subtree {
            Some(root) if target.hkey() < root => root.clone(),
            _ => target.hkey().clone(),
        };
        if let Some(store) = self.store.as_mut() {
            self.pending = store.seek(SeekTarget::HKey(&hkey), SeekMode::AtOrAfter)?;
        }
        Ok(())
    }

    fn close(&mut self) -> ExecResult<()> {
        self.store = None;
        self.pending = None;
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
        "GroupScan"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arbordb_core::catalog::GroupBuilder;
    use arbordb_core::{Field, Value, ValueType};
    use arbordb_storage::MemoryStore;

    fn fixture() -> (Arc<ExecutionContext>, Arc<Group>) {
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
        store
            .insert_all([
                ("customer", vec![Value::Int(1)]),
                ("customer", vec![Value::Int(2)]),
                ("order", vec![Value::Int(10), Value::Int(1)]),
                ("order", vec![Value::Int(20), Value::Int(2)]),
                ("order", vec![Value::Int(21), Value::Int(2)]),
            ])
            .unwrap();
        (Arc::new(ExecutionContext::new().with_store(Arc::new(store))), group)
    }

    fn first_values(scan: &mut GroupScan) -> Vec<i64> {
        let mut out = Vec::new();
        while let Some(row) = scan.next().unwrap() {
            out.push(row.values()[0].as_int().unwrap());
        }
        out
    }

    #[test]
    fn scans_in_hkey_order() {
        let (ctx, group) = fixture();
        let mut scan = GroupScan::new(&group);
        scan.open_top_level(&ctx).unwrap();
        assert_eq!(first_values(&mut scan), vec![1, 10, 2, 20, 21]);
        scan.close_top_level().unwrap();
    }

    #[test]
    fn subtree_scan_and_jump() {
        let (ctx, group) = fixture();
        let root = HKey::root(1, vec![Value::Int(2)]);
        let mut scan = GroupScan::new(&group).subtree(root.clone());
        scan.open_top_level(&ctx).unwrap();
        assert_eq!(first_values(&mut scan), vec![2, 20, 21]);

        scan.open().unwrap();
        let store = ctx.store().unwrap();
        let order_21 = store.lookup(&root.extend(2, vec![Value::Int(21)])).unwrap().unwrap();
        scan.jump(&order_21, ColumnSelector::All).unwrap();
        assert_eq!(first_values(&mut scan), vec![21]);
        scan.close_bindings().unwrap();
    }
}
