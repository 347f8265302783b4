//! In-memory group store.
//!
//! Table rows are kept per table. Every change rebuilds an immutable
//! snapshot: all group rows sorted by hkey plus one sorted row vector per
//! registered index. Cursors share the snapshot through an [`Arc`], so a
//! cursor opened before a write keeps seeing the old rows.
//!
//! HKeys are derived on rebuild by following each row's grouping foreign
//! key to its parent. A row whose parent is absent is an orphan: its hkey
//! keeps the referenced parent key and null-fills the segments above it.

mod cursor;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arbordb_core::catalog::{CompositionField, Group, GroupIndexJoin, IndexDef, IndexKind};
use arbordb_core::{compare_value_slices, HKey, Row, Value};
use tracing::debug;

pub use cursor::MemoryCursor;
use cursor::SortedBy;

use crate::engine::{GroupStore, StorageError, StorageResult, StoreCursor};

/// A key tuple ordered by [`compare_value_slices`].
#[derive(Debug, Clone)]
struct KeyTuple(Vec<Value>);

impl PartialEq for KeyTuple {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyTuple {}

impl PartialOrd for KeyTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_value_slices(&self.0, &other.0)
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    group_rows: Arc<Vec<Row>>,
    by_hkey: BTreeMap<HKey, usize>,
    index_rows: HashMap<String, Arc<Vec<Row>>>,
}

/// An in-memory [`GroupStore`].
#[derive(Debug)]
pub struct MemoryStore {
    group: Arc<Group>,
    tables: Vec<BTreeMap<KeyTuple, Vec<Value>>>,
    indexes: Vec<Arc<IndexDef>>,
    snapshot: Snapshot,
}

impl MemoryStore {
    /// Creates an empty store for `group`.
    #[must_use]
    pub fn new(group: Arc<Group>) -> Self {
        let tables = vec![BTreeMap::new(); group.tables().len()];
        Self { group, tables, indexes: Vec::new(), snapshot: Snapshot::default() }
    }

    /// Inserts one row into `table`.
    ///
    /// # Errors
    ///
    /// Fails if the table is unknown, the row does not fit the table's row
    /// type, or the primary key is already present.
    pub fn insert(&mut self, table: &str, values: Vec<Value>) -> StorageResult<()> {
        self.stage(table, values)?;
        self.rebuild()
    }

    /// Inserts many rows and rebuilds the snapshot once.
    pub fn insert_all<'a, I>(&mut self, rows: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (&'a str, Vec<Value>)>,
    {
        for (table, values) in rows {
            self.stage(table, values)?;
        }
        self.rebuild()
    }

    /// Removes the row of `table` with primary key `key`. Returns whether it existed.
    pub fn delete(&mut self, table: &str, key: Vec<Value>) -> StorageResult<bool> {
        let position = self.group.table_position(table)?;
        let removed = self.tables[position].remove(&KeyTuple(key)).is_some();
        if removed {
            self.rebuild()?;
        }
        Ok(removed)
    }

    /// Registers an index and builds its rows.
    ///
    /// # Errors
    ///
    /// Fails if the index belongs to another group or its name is taken.
    pub fn add_index(&mut self, index: Arc<IndexDef>) -> StorageResult<()> {
        if !Arc::ptr_eq(index.owner_group(), &self.group) {
            return Err(StorageError::Unsupported(format!(
                "index {} belongs to group {}, not {}",
                index.name(),
                index.owner_group().name(),
                self.group.name()
            )));
        }
        if self.indexes.iter().any(|i| i.name() == index.name()) {
            return Err(StorageError::Unsupported(format!("index {} already exists", index.name())));
        }
        self.indexes.push(index);
        self.rebuild()
    }

    /// Returns the number of rows in the group.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.snapshot.group_rows.len()
    }

    fn stage(&mut self, table: &str, values: Vec<Value>) -> StorageResult<()> {
        let position = self.group.table_position(table)?;
        let def = &self.group.tables()[position];
        // Validates arity and field types.
        let row = Row::new(Arc::clone(def.row_type()), values, HKey::empty())?;
        let key = KeyTuple(def.key_values(row.values()));
        if self.tables[position].contains_key(&key) {
            let rendered: Vec<String> = key.0.iter().map(ToString::to_string).collect();
            return Err(StorageError::DuplicateKey { table: table.to_owned(), key: rendered.join(", ") });
        }
        self.tables[position].insert(key, row.values().to_vec());
        Ok(())
    }

    fn rebuild(&mut self) -> StorageResult<()> {
        // Tables are in depth-first order, so parents are keyed before their children.
        let mut hkeys: Vec<BTreeMap<KeyTuple, HKey>> = vec![BTreeMap::new(); self.tables.len()];
        let mut group_rows = Vec::new();
        for (position, def) in self.group.tables().iter().enumerate() {
            for (key, values) in &self.tables[position] {
                let parent_hkey = match def.parent() {
                    None => HKey::empty(),
                    Some(parent) => {
                        let parent_key = KeyTuple(def.parent_key_values(values));
                        match hkeys[parent].get(&parent_key) {
                            Some(hkey) => hkey.clone(),
                            None => self.group.orphan_parent_hkey(def, values),
                        }
                    }
                };
                let hkey = parent_hkey.extend(def.ordinal(), key.0.clone());
                hkeys[position].insert(key.clone(), hkey.clone());
                group_rows.push(Row::new(Arc::clone(def.row_type()), values.clone(), hkey)?);
            }
        }
        group_rows.sort_by(|a, b| a.hkey().cmp(b.hkey()));
        let by_hkey = group_rows.iter().enumerate().map(|(i, row)| (row.hkey().clone(), i)).collect();

        let mut snapshot = Snapshot { group_rows: Arc::new(group_rows), by_hkey, index_rows: HashMap::new() };
        for index in &self.indexes {
            let rows = build_index_rows(index, &snapshot)?;
            snapshot.index_rows.insert(index.name().to_owned(), Arc::new(rows));
        }
        debug!(
            group = self.group.name(),
            rows = snapshot.group_rows.len(),
            indexes = snapshot.index_rows.len(),
            "rebuilt memory snapshot"
        );
        self.snapshot = snapshot;
        Ok(())
    }
}

/// Returns the value for one composition field given the rows of the path
/// (root to leaf, `None` where absent) and the entry's hkey.
fn field_value(field: &CompositionField, path_rows: &[(usize, Option<&Row>)], hkey: &HKey) -> Value {
    if let Some(component) = field.hkey {
        return hkey
            .segments()
            .get(component.depth)
            .and_then(|s| s.values().get(component.position))
            .cloned()
            .unwrap_or(Value::Null);
    }
    path_rows
        .iter()
        .find(|(table, _)| *table == field.column.table)
        .and_then(|(_, row)| row.and_then(|r| r.value(field.column.column)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn build_index_rows(index: &IndexDef, snapshot: &Snapshot) -> StorageResult<Vec<Row>> {
    let group = index.owner_group();
    let leaf = group.table_at(index.leaf_table())?;
    let root_depth = group.table_at(index.root_table())?.depth();
    let path: Vec<usize> = leaf.ancestry()[root_depth..].to_vec();
    let lookup = |hkey: &HKey| snapshot.by_hkey.get(hkey).map(|&i| &snapshot.group_rows[i]);

    let mut entries: Vec<(Vec<(usize, Option<&Row>)>, HKey)> = Vec::new();
    match index.kind() {
        IndexKind::Table | IndexKind::Group(GroupIndexJoin::Right) => {
            for row in snapshot.group_rows.iter().filter(|r| r.row_type().same_as(leaf.row_type())) {
                let path_rows = path
                    .iter()
                    .map(|&table| {
                        let depth = group.tables()[table].depth();
                        let found = row.hkey().ancestor(depth + 1).and_then(|h| lookup(&h));
                        (table, found)
                    })
                    .collect();
                entries.push((path_rows, row.hkey().clone()));
            }
        }
        IndexKind::Group(GroupIndexJoin::Left) => {
            let root_type = group.tables()[path[0]].row_type();
            for root in snapshot.group_rows.iter().filter(|r| r.row_type().same_as(root_type)) {
                extend_left(group, snapshot, &path, vec![(path[0], Some(root))], root, &mut entries);
            }
        }
    }

    let mut rows = entries
        .into_iter()
        .map(|(path_rows, hkey)| {
            let values =
                index.composition().fields().iter().map(|f| field_value(f, &path_rows, &hkey)).collect();
            Row::new(Arc::clone(index.row_type()), values, hkey).map_err(StorageError::from)
        })
        .collect::<StorageResult<Vec<_>>>()?;
    rows.sort_by(|a, b| compare_value_slices(a.values(), b.values()));
    Ok(rows)
}

/// Walks down the index path below `current`, emitting one entry per
/// complete chain and one partial entry where the chain stops short.
fn extend_left<'a>(
    group: &Group,
    snapshot: &'a Snapshot,
    path: &[usize],
    chain: Vec<(usize, Option<&'a Row>)>,
    current: &'a Row,
    entries: &mut Vec<(Vec<(usize, Option<&'a Row>)>, HKey)>,
) {
    let level = chain.len();
    let Some(&next_table) = path.get(level) else {
        entries.push((chain, current.hkey().clone()));
        return;
    };
    let next_type = group.tables()[next_table].row_type();
    let children: Vec<&Row> = snapshot
        .group_rows
        .iter()
        .filter(|r| r.row_type().same_as(next_type) && current.is_ancestor_of(r))
        .collect();
    if children.is_empty() {
        let mut partial = chain;
        partial.extend(path[level..].iter().map(|&table| (table, None)));
        entries.push((partial, current.hkey().clone()));
        return;
    }
    for child in children {
        let mut longer = chain.clone();
        longer.push((next_table, Some(child)));
        extend_left(group, snapshot, path, longer, child, entries);
    }
}

impl GroupStore for MemoryStore {
    fn group(&self) -> &Arc<Group> {
        &self.group
    }

    fn group_cursor(&self) -> StorageResult<Box<dyn StoreCursor>> {
        Ok(Box::new(MemoryCursor::new(Arc::clone(&self.snapshot.group_rows), SortedBy::HKey)))
    }

    fn index_cursor(&self, index: &IndexDef) -> StorageResult<Box<dyn StoreCursor>> {
        let rows = self
            .snapshot
            .index_rows
            .get(index.name())
            .ok_or_else(|| StorageError::UnknownIndex(index.name().to_owned()))?;
        Ok(Box::new(MemoryCursor::new(Arc::clone(rows), SortedBy::Values)))
    }

    fn lookup(&self, hkey: &HKey) -> StorageResult<Option<Row>> {
        Ok(self.snapshot.by_hkey.get(hkey).map(|&i| self.snapshot.group_rows[i].clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::{SeekMode, SeekTarget};
    use arbordb_core::catalog::GroupBuilder;
    use arbordb_core::{Field, ValueType};

    fn coi() -> Arc<Group> {
        GroupBuilder::new("coi")
            .root("customer", vec![Field::not_null("cid", ValueType::Int), Field::new("name", ValueType::String)], &["cid"])
            .child(
                "order",
                "customer",
                vec![Field::not_null("oid", ValueType::Int), Field::new("cid", ValueType::Int), Field::new("salesman", ValueType::String)],
                &["oid"],
                &["cid"],
            )
            .build()
            .unwrap()
    }

    fn store() -> MemoryStore {
        let mut store = MemoryStore::new(coi());
        store
            .insert_all([
                ("customer", vec![Value::Int(2), "bob".into()]),
                ("customer", vec![Value::Int(1), "alice".into()]),
                ("order", vec![Value::Int(21), Value::Int(2), "zed".into()]),
                ("order", vec![Value::Int(11), Value::Int(1), "amy".into()]),
                ("order", vec![Value::Int(12), Value::Int(1), "zed".into()]),
                ("order", vec![Value::Int(99), Value::Int(9), "amy".into()]),
            ])
            .unwrap();
        store
    }

    fn ints(row: &Row) -> Vec<Option<i64>> {
        row.values().iter().map(Value::as_int).collect()
    }

    #[test]
    fn group_rows_are_hkey_ordered() {
        let store = store();
        let mut cursor = store.group_cursor().unwrap();
        let mut names = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            names.push((row.row_type().name().to_owned(), row.values()[0].as_int().unwrap()));
        }
        let expected = [("customer", 1), ("order", 11), ("order", 12), ("customer", 2), ("order", 21), ("order", 99)];
        let expected: Vec<(String, i64)> = expected.iter().map(|(t, k)| ((*t).to_owned(), *k)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn orphans_keep_their_parent_key() {
        let store = store();
        let orphan_hkey = HKey::root(1, vec![Value::Int(9)]).extend(2, vec![Value::Int(99)]);
        let row = store.lookup(&orphan_hkey).unwrap().unwrap();
        assert_eq!(ints(&row), vec![Some(99), Some(9), None]);
        assert!(store.lookup(&HKey::root(1, vec![Value::Int(9)])).unwrap().is_none());
    }

    #[test]
    fn table_index_rows_carry_hkey_fields() {
        let mut store = store();
        let group = Arc::clone(store.group());
        let index = IndexDef::table(&group, "order_salesman", "order", &["salesman"]).unwrap();
        store.add_index(Arc::clone(&index)).unwrap();

        let mut cursor = store.index_cursor(&index).unwrap();
        let amy = [Value::from("amy")];
        let first = cursor.seek(SeekTarget::Key(&amy), SeekMode::AtOrAfter).unwrap().unwrap();
        assert_eq!(first.values(), &[Value::from("amy"), Value::Int(1), Value::Int(11)]);
        assert_eq!(first.hkey(), &HKey::root(1, vec![Value::Int(1)]).extend(2, vec![Value::Int(11)]));
        let last_amy = cursor.seek(SeekTarget::Key(&amy), SeekMode::AtOrBefore).unwrap().unwrap();
        assert_eq!(last_amy.values()[2], Value::Int(99));
    }

    #[test]
    fn left_group_index_keeps_childless_roots() {
        let mut store = store();
        store.insert("customer", vec![Value::Int(3), "carol".into()]).unwrap();
        let group = Arc::clone(store.group());
        let index =
            IndexDef::group(&group, "name_salesman", &[("customer", "name"), ("order", "salesman")], GroupIndexJoin::Left)
                .unwrap();
        store.add_index(Arc::clone(&index)).unwrap();

        let mut cursor = store.index_cursor(&index).unwrap();
        let mut seen = Vec::new();
        while let Some(row) = cursor.next().unwrap() {
            seen.push((row.values()[0].clone(), row.values()[1].clone(), row.hkey().depth()));
        }
        assert_eq!(
            seen,
            vec![
                ("alice".into(), "amy".into(), 2),
                ("alice".into(), "zed".into(), 2),
                ("bob".into(), "zed".into(), 2),
                ("carol".into(), Value::Null, 1),
            ]
        );
    }

    #[test]
    fn right_group_index_keeps_orphans() {
        let mut store = store();
        let group = Arc::clone(store.group());
        let index =
            IndexDef::group(&group, "name_salesman", &[("customer", "name"), ("order", "salesman")], GroupIndexJoin::Right)
                .unwrap();
        store.add_index(Arc::clone(&index)).unwrap();

        let mut cursor = store.index_cursor(&index).unwrap();
        let first = cursor.seek_first().unwrap().unwrap();
        assert_eq!(first.values()[0], Value::Null);
        assert_eq!(first.values()[1], Value::from("amy"));
        assert_eq!(first.values()[2], Value::Int(9));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut store = store();
        let result = store.insert("customer", vec![Value::Int(1), "again".into()]);
        assert!(matches!(result, Err(StorageError::DuplicateKey { .. })));
    }

    #[test]
    fn cursors_keep_their_snapshot() {
        let mut store = store();
        let mut cursor = store.group_cursor().unwrap();
        assert!(store.delete("customer", vec![Value::Int(1)]).unwrap());
        let mut count = 0;
        while cursor.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 6);
        assert_eq!(store.row_count(), 5);
    }

    #[test]
    fn unknown_index_is_reported() {
        let store = store();
        let group = Arc::clone(store.group());
        let index = IndexDef::table(&group, "never_added", "order", &["salesman"]).unwrap();
        assert!(matches!(store.index_cursor(&index), Err(StorageError::UnknownIndex(_))));
    }
}
