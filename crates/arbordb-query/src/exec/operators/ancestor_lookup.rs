//! Ancestor lookup by hkey prefix.

use std::collections::VecDeque;
use std::sync::Arc;

use arbordb_core::catalog::Group;
use arbordb_core::{HKey, Row, RowType};
use arbordb_storage::GroupStore;

use crate::error::{ExecError, ExecResult};
use crate::exec::bindings::QueryBindings;
use crate::exec::context::ExecutionContext;
use crate::exec::cursor::{pull, BoxedCursor, Cursor, CursorBase, CursorState};

/// Whether input rows are emitted after their ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPreservation {
    /// Emit each input row after its ancestors.
    KeepInput,
    /// Emit only the ancestors.
    DiscardInput,
}

#[derive(Debug)]
struct AncestorSlot {
    row_type: Arc<RowType>,
    depth: usize,
    last: Option<HKey>,
}

/// For each input row, fetches the rows of the requested ancestor tables.
///
/// Ancestors are emitted root first. An ancestor is fetched by exact hkey,
/// so orphan rows produce only the ancestors that exist. An ancestor that
/// was just emitted for the previous input row is not emitted again.
pub struct AncestorLookup {
    base: CursorBase,
    input: BoxedCursor,
    input_type: Arc<RowType>,
    ancestors: Vec<AncestorSlot>,
    preservation: InputPreservation,
    store: Option<Arc<dyn GroupStore>>,
    pending: VecDeque<Row>,
}

impl AncestorLookup {
    /// Creates a lookup of `ancestors` for rows of `input_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::InvalidArgument`] if the ancestor list is empty,
    /// an ancestor is not a table of `group` that is a proper ancestor of the
    /// input's table, or index rows are to be kept. For index input the
    /// index's own (leafmost) table is also accepted.
    pub fn new(
        group: &Group,
        input: BoxedCursor,
        input_type: Arc<RowType>,
        ancestors: Vec<Arc<RowType>>,
        preservation: InputPreservation,
    ) -> ExecResult<Self> {
        if ancestors.is_empty() {
            return Err(ExecError::invalid_argument("ancestor lookup needs at least one ancestor type"));
        }
        if input_type.is_index() && preservation == InputPreservation::KeepInput {
            return Err(ExecError::invalid_argument(format!(
                "index rows of {} cannot be kept by an ancestor lookup",
                input_type.name()
            )));
        }
        let input_table = input_type
            .hkey_table_ordinal()
            .and_then(|ordinal| group.table_by_ordinal(ordinal))
            .ok_or_else(|| ExecError::invalid_argument(format!("{} is not a row of group {}", input_type, group.name())))?;
        let input_position = group.table_position(input_table.name())?;

        let mut slots = Vec::with_capacity(ancestors.len());
        for ancestor in ancestors {
            if !ancestor.is_table() {
                return Err(ExecError::invalid_argument(format!("ancestor {} is not a table row type", ancestor.name())));
            }
            let position = group.table_position(ancestor.name())?;
            // Index rows resolve to their own table as well.
            let reflexive = input_type.is_index() && position == input_position;
            if !reflexive && !group.is_ancestor(position, input_position) {
                return Err(ExecError::invalid_argument(format!(
                    "{} is not an ancestor of {}",
                    ancestor.name(),
                    input_table.name()
                )));
            }
            let depth = group.table_at(position)?.depth();
            slots.push(AncestorSlot { row_type: ancestor, depth, last: None });
        }
        slots.sort_by_key(|s| s.depth);
        slots.dedup_by_key(|s| s.depth);

        let row_type = RowType::derived(format!("ancestors({})", input_type.name()), Vec::new());
        Ok(Self {
            base: CursorBase::new("AncestorLookup", row_type),
            input,
            input_type,
            ancestors: slots,
            preservation,
            store: None,
            pending: VecDeque::new(),
        })
    }

    fn expand(&mut self, row: Row) -> ExecResult<()> {
        if row.row_type().same_as(&self.input_type) {
            let store = self.store.as_ref().ok_or_else(|| self.base.state_error("no store while active"))?;
            for slot in &mut self.ancestors {
                // A partial hkey has no segment for deeper ancestors.
                let Some(hkey) = row.hkey().ancestor(slot.depth + 1) else {
                    continue;
                };
                if slot.last.as_ref() == Some(&hkey) {
                    continue;
                }
                if let Some(found) = store.lookup(&hkey)? {
                    if found.row_type().same_as(&slot.row_type) {
                        self.pending.push_back(found);
                        slot.last = Some(hkey);
                    }
                }
            }
        }
        if self.preservation == InputPreservation::KeepInput {
            self.pending.push_back(row);
        }
        Ok(())
    }
}

impl Cursor for AncestorLookup {
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
        self.store = Some(Arc::clone(self.base.ctx()?.store()?));
        self.input.open()?;
        for slot in &mut self.ancestors {
            slot.last = None;
        }
        self.base.set_active();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<Row>> {
        self.base.check_active("next")?;
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Ok(Some(self.base.produced(row)));
            }
            match pull(&mut self.input)? {
                Some(row) => self.expand(row)?,
                None => {
                    self.close()?;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) -> ExecResult<()> {
        if self.base.set_closed() {
            self.input.close()?;
        }
        self.pending.clear();
        self.store = None;
        Ok(())
    }

    fn state(&self) -> CursorState {
        self.base.state()
    }

    fn row_type(&self) -> Arc<RowType> {
        self.base.row_type()
    }

    fn name(&self) -> &'static str {
        "AncestorLookup"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use arbordb_core::catalog::{GroupBuilder, GroupIndexJoin, IndexDef};
    use arbordb_core::{Field, Value, ValueType};
    use arbordb_storage::MemoryStore;

    use crate::exec::operators::index_scan::IndexScan;
    use crate::exec::operators::key_range::IndexKeyRange;
    use crate::exec::operators::values::ValuesScan;

    fn coi() -> Arc<Group> {
        GroupBuilder::new("coi")
            .root("customer", vec![Field::not_null("cid", ValueType::Int)], &["cid"])
            .child(
                "order",
                "customer",
                vec![Field::not_null("oid", ValueType::Int), Field::new("cid", ValueType::Int)],
                &["oid"],
                &["cid"],
            )
            .child(
                "item",
                "order",
                vec![Field::not_null("iid", ValueType::Int), Field::new("oid", ValueType::Int)],
                &["iid"],
                &["oid"],
            )
            .build()
            .unwrap()
    }

    fn fixture() -> (Arc<ExecutionContext>, Arc<Group>, Arc<MemoryStore>) {
        let group = coi();
        let mut store = MemoryStore::new(Arc::clone(&group));
        store
            .insert_all([
                ("customer", vec![Value::Int(1)]),
                ("order", vec![Value::Int(10), Value::Int(1)]),
                ("order", vec![Value::Int(11), Value::Int(1)]),
                ("item", vec![Value::Int(100), Value::Int(10)]),
                ("item", vec![Value::Int(101), Value::Int(10)]),
                ("item", vec![Value::Int(110), Value::Int(11)]),
                // Orphan: order 99 does not exist.
                ("item", vec![Value::Int(990), Value::Int(99)]),
            ])
            .unwrap();
        let store = Arc::new(store);
        let ctx = Arc::new(ExecutionContext::new().with_store(Arc::clone(&store) as Arc<dyn GroupStore>));
        (ctx, group, store)
    }

    fn rows_of(store: &MemoryStore, table: &str) -> Vec<Row> {
        let mut cursor = store.group_cursor().unwrap();
        let mut out = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            if row.row_type().name() == table {
                out.push(row);
            }
        }
        out
    }

    fn describe(cursor: &mut dyn Cursor) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            out.push(format!("{}:{}", row.row_type().name(), row.values()[0]));
        }
        out
    }

    #[test]
    fn emits_ancestors_once_per_change() {
        let (ctx, group, store) = fixture();
        let item = group.row_type("item").unwrap();
        let input = ValuesScan::new(Arc::clone(&item), rows_of(&store, "item")).unwrap();
        let mut lookup = AncestorLookup::new(
            &group,
            Box::new(input),
            item,
            vec![group.row_type("order").unwrap(), group.row_type("customer").unwrap()],
            InputPreservation::KeepInput,
        )
        .unwrap();
        lookup.open_top_level(&ctx).unwrap();
        // The orphan's hkey is {customer(null), order(99), item(990)}: neither ancestor exists.
        // Rows of the null customer sort first.
        assert_eq!(
            describe(&mut lookup),
            vec![
                "item:990",
                "customer:1",
                "order:10",
                "item:100",
                "item:101",
                "order:11",
                "item:110",
            ]
        );
        lookup.close_top_level().unwrap();
    }

    #[test]
    fn index_rows_with_discarded_input() {
        let (_, group, _) = fixture();
        let index = IndexDef::table(&group, "item_oid", "item", &["oid"]).unwrap();
        let mut store = MemoryStore::new(Arc::clone(&group));
        store
            .insert_all([
                ("customer", vec![Value::Int(1)]),
                ("order", vec![Value::Int(10), Value::Int(1)]),
                ("item", vec![Value::Int(100), Value::Int(10)]),
                ("item", vec![Value::Int(101), Value::Int(10)]),
            ])
            .unwrap();
        store.add_index(Arc::clone(&index)).unwrap();
        let ctx = Arc::new(ExecutionContext::new().with_store(Arc::new(store)));

        let scan = IndexScan::ascending(Arc::clone(&index), IndexKeyRange::unbounded()).unwrap();
        let mut lookup = AncestorLookup::new(
            &group,
            Box::new(scan),
            Arc::clone(index.row_type()),
            vec![group.row_type("order").unwrap()],
            InputPreservation::DiscardInput,
        )
        .unwrap();
        lookup.open_top_level(&ctx).unwrap();
        assert_eq!(describe(&mut lookup), vec!["order:10"]);

        // A second execution starts with no memory of emitted ancestors.
        lookup.open().unwrap();
        assert_eq!(describe(&mut lookup), vec!["order:10"]);
        lookup.close_top_level().unwrap();
    }

    #[test]
    fn invalid_ancestors_are_rejected() {
        let (_, group, store) = fixture();
        let order = group.row_type("order").unwrap();
        let item = group.row_type("item").unwrap();
        let input = || -> BoxedCursor {
            Box::new(ValuesScan::new(group.row_type("item").unwrap(), rows_of(&store, "item")).unwrap())
        };

        let empty = AncestorLookup::new(&group, input(), Arc::clone(&item), Vec::new(), InputPreservation::KeepInput);
        assert!(matches!(empty, Err(ExecError::InvalidArgument(_))));

        let not_ancestor =
            AncestorLookup::new(&group, input(), Arc::clone(&order), vec![Arc::clone(&item)], InputPreservation::KeepInput);
        assert!(matches!(not_ancestor, Err(ExecError::InvalidArgument(_))));

        let itself = AncestorLookup::new(&group, input(), Arc::clone(&item), vec![item], InputPreservation::KeepInput);
        assert!(matches!(itself, Err(ExecError::InvalidArgument(_))));
    }

    #[test]
    fn kept_index_rows_are_rejected() {
        let (_, group, store) = fixture();
        let index = IndexDef::table(&group, "item_oid", "item", &["oid"]).unwrap();
        let input = ValuesScan::new(group.row_type("item").unwrap(), rows_of(&store, "item")).unwrap();
        let result = AncestorLookup::new(
            &group,
            Box::new(input),
            Arc::clone(index.row_type()),
            vec![group.row_type("order").unwrap()],
            InputPreservation::KeepInput,
        );
        assert!(matches!(result, Err(ExecError::InvalidArgument(_))));
    }

    fn named_coi() -> (Arc<Group>, MemoryStore) {
        let group = GroupBuilder::new("coi")
            .root("customer", vec![Field::not_null("cid", ValueType::Int), Field::new("name", ValueType::String)], &["cid"])
            .child(
                "order",
                "customer",
                vec![Field::not_null("oid", ValueType::Int), Field::new("cid", ValueType::Int), Field::new("salesman", ValueType::String)],
                &["oid"],
                &["cid"],
            )
            .child(
                "item",
                "order",
                vec![Field::not_null("iid", ValueType::Int), Field::new("oid", ValueType::Int), Field::new("sku", ValueType::String)],
                &["iid"],
                &["oid"],
            )
            .build()
            .unwrap();
        let mut store = MemoryStore::new(Arc::clone(&group));
        store
            .insert_all([
                ("customer", vec![Value::Int(1), Value::from("ann")]),
                ("customer", vec![Value::Int(2), Value::from("bob")]),
                ("customer", vec![Value::Int(3), Value::from("cy")]),
                ("order", vec![Value::Int(10), Value::Int(1), Value::from("x")]),
                ("order", vec![Value::Int(11), Value::Int(1), Value::from("y")]),
                ("order", vec![Value::Int(20), Value::Int(2), Value::from("x")]),
                ("item", vec![Value::Int(100), Value::Int(10), Value::from("p")]),
                ("item", vec![Value::Int(101), Value::Int(10), Value::from("q")]),
                ("item", vec![Value::Int(200), Value::Int(20), Value::from("p")]),
            ])
            .unwrap();
        (group, store)
    }

    fn lookup_through(
        group: &Arc<Group>,
        mut store: MemoryStore,
        index: &Arc<IndexDef>,
        range: IndexKeyRange,
        tables: &[&str],
    ) -> Vec<String> {
        store.add_index(Arc::clone(index)).unwrap();
        let ctx = Arc::new(ExecutionContext::new().with_store(Arc::new(store)));
        let scan = IndexScan::ascending(Arc::clone(index), range).unwrap();
        let mut lookup = AncestorLookup::new(
            group,
            Box::new(scan),
            Arc::clone(index.row_type()),
            tables.iter().map(|t| group.row_type(t).unwrap()).collect(),
            InputPreservation::DiscardInput,
        )
        .unwrap();
        lookup.open_top_level(&ctx).unwrap();
        let out = describe(&mut lookup);
        lookup.close_top_level().unwrap();
        out
    }

    #[test]
    fn table_index_rows_resolve_to_their_own_table() {
        let (group, store) = named_coi();
        let index = IndexDef::table(&group, "customer_name", "customer", &["name"]).unwrap();
        let found = lookup_through(&group, store, &index, IndexKeyRange::equal(["bob"]).unwrap(), &["customer"]);
        assert_eq!(found, vec!["customer:2"]);
    }

    #[test]
    fn group_index_rows_resolve_to_rootmost_and_leafmost_tables() {
        let (group, store) = named_coi();
        let index =
            IndexDef::group(&group, "name_salesman", &[("customer", "name"), ("order", "salesman")], GroupIndexJoin::Left)
                .unwrap();
        // The childless customer 3 has a partial entry that carries only its own hkey.
        let found = lookup_through(&group, store, &index, IndexKeyRange::unbounded(), &["order", "customer"]);
        assert_eq!(found, vec!["customer:1", "order:10", "order:11", "customer:2", "order:20", "customer:3"]);
    }

    #[test]
    fn group_index_rows_resolve_to_internal_tables() {
        let (group, store) = named_coi();
        let index = IndexDef::group(
            &group,
            "name_salesman_sku",
            &[("customer", "name"), ("order", "salesman"), ("item", "sku")],
            GroupIndexJoin::Right,
        )
        .unwrap();
        let found = lookup_through(&group, store, &index, IndexKeyRange::unbounded(), &["item", "order"]);
        assert_eq!(found, vec!["order:10", "item:100", "item:101", "order:20", "item:200"]);
    }

    #[test]
    fn table_rows_do_not_resolve_to_their_own_table() {
        let (group, store) = named_coi();
        let customer = group.row_type("customer").unwrap();
        let input = ValuesScan::new(Arc::clone(&customer), rows_of(&store, "customer")).unwrap();
        let result =
            AncestorLookup::new(&group, Box::new(input), Arc::clone(&customer), vec![customer], InputPreservation::DiscardInput);
        assert!(matches!(result, Err(ExecError::InvalidArgument(_))));
    }
}
