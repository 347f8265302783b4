//! Groups of tables linked by grouping foreign keys.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::types::{Field, HKey, RowKind, RowType, Value};

/// A reference to one column of one table in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Position of the table in [`Group::tables`].
    pub table: usize,
    /// Column position in the table.
    pub column: usize,
}

/// One value of a table's hkey: segment `depth`, value `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HKeyComponent {
    /// Segment index (0 is the root table).
    pub depth: usize,
    /// Position within the segment's key values.
    pub position: usize,
}

/// A table of a group.
#[derive(Debug, Clone)]
pub struct TableDef {
    name: String,
    ordinal: u32,
    depth: usize,
    parent: Option<usize>,
    primary_key: Vec<usize>,
    parent_join: Vec<usize>,
    ancestry: Vec<usize>,
    row_type: Arc<RowType>,
}

impl TableDef {
    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ordinal (position in depth-first group order, from 1).
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Returns the depth (root is 0).
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the parent table's position, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Returns the primary-key column positions.
    #[must_use]
    pub fn primary_key(&self) -> &[usize] {
        &self.primary_key
    }

    /// Returns the grouping foreign-key columns, aligned with the parent's primary key.
    #[must_use]
    pub fn parent_join(&self) -> &[usize] {
        &self.parent_join
    }

    /// Returns the table positions from the root down to this table.
    #[must_use]
    pub fn ancestry(&self) -> &[usize] {
        &self.ancestry
    }

    /// Returns the table's row type.
    #[must_use]
    pub const fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Returns the column position named `column`.
    pub fn column(&self, column: &str) -> CoreResult<usize> {
        self.row_type.fields().iter().position(|f| f.name == column).ok_or_else(|| {
            CoreError::UnknownColumn { table: self.name.clone(), column: column.to_owned() }
        })
    }

    /// Returns this table's own hkey segment values for a row.
    #[must_use]
    pub fn key_values(&self, values: &[Value]) -> Vec<Value> {
        self.primary_key.iter().map(|&c| values.get(c).cloned().unwrap_or(Value::Null)).collect()
    }

    /// Returns the parent's key values referenced by a row.
    #[must_use]
    pub fn parent_key_values(&self, values: &[Value]) -> Vec<Value> {
        self.parent_join.iter().map(|&c| values.get(c).cloned().unwrap_or(Value::Null)).collect()
    }
}

/// A group: a tree of tables interleaved by hkey.
#[derive(Debug, Clone)]
pub struct Group {
    name: String,
    tables: Vec<TableDef>,
}

impl Group {
    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tables in ordinal order.
    #[must_use]
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Returns the table at `position`.
    pub fn table_at(&self, position: usize) -> CoreResult<&TableDef> {
        self.tables.get(position).ok_or_else(|| CoreError::UnknownTable(format!("#{position}")))
    }

    /// Returns the position of the table named `name`.
    pub fn table_position(&self, name: &str) -> CoreResult<usize> {
        self.tables.iter().position(|t| t.name == name).ok_or_else(|| CoreError::UnknownTable(name.to_owned()))
    }

    /// Returns the table named `name`.
    pub fn table(&self, name: &str) -> CoreResult<&TableDef> {
        self.table_position(name).map(|p| &self.tables[p])
    }

    /// Returns the table with `ordinal`.
    #[must_use]
    pub fn table_by_ordinal(&self, ordinal: u32) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.ordinal == ordinal)
    }

    /// Returns the row type of the table named `name`.
    pub fn row_type(&self, name: &str) -> CoreResult<Arc<RowType>> {
        self.table(name).map(|t| Arc::clone(&t.row_type))
    }

    /// Returns a column reference by names.
    pub fn column_ref(&self, table: &str, column: &str) -> CoreResult<ColumnRef> {
        let position = self.table_position(table)?;
        let column = self.tables[position].column(column)?;
        Ok(ColumnRef { table: position, column })
    }

    /// Returns true if `ancestor` is a proper ancestor of `descendant`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: usize, descendant: usize) -> bool {
        self.tables
            .get(descendant)
            .is_some_and(|t| t.ancestry.len() > 1 && t.ancestry[..t.ancestry.len() - 1].contains(&ancestor))
    }

    /// Returns the hkey component a column is equivalent to, if any.
    ///
    /// A primary-key column is its own segment's component; a grouping
    /// foreign-key column is the parent's component it references.
    #[must_use]
    pub fn hkey_component(&self, column: ColumnRef) -> Option<HKeyComponent> {
        let table = self.tables.get(column.table)?;
        if let Some(position) = table.primary_key.iter().position(|&c| c == column.column) {
            return Some(HKeyComponent { depth: table.depth, position });
        }
        let position = table.parent_join.iter().position(|&c| c == column.column)?;
        let parent = table.parent?;
        let parent_column = *self.tables[parent].primary_key.get(position)?;
        self.hkey_component(ColumnRef { table: parent, column: parent_column })
    }

    /// Returns true if two columns always hold the same value for related rows.
    #[must_use]
    pub fn columns_equivalent(&self, a: ColumnRef, b: ColumnRef) -> bool {
        if a == b {
            return true;
        }
        match (self.hkey_component(a), self.hkey_component(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// Returns the hkey of a row whose ancestors are all absent.
    ///
    /// Segments above the parent are null-filled; the parent segment uses
    /// the row's join columns.
    #[must_use]
    pub fn orphan_parent_hkey(&self, table: &TableDef, values: &[Value]) -> HKey {
        let mut hkey = HKey::empty();
        let Some(parent) = table.parent else {
            return hkey;
        };
        let parent_def = &self.tables[parent];
        for &ancestor in &parent_def.ancestry[..parent_def.ancestry.len() - 1] {
            let def = &self.tables[ancestor];
            hkey = hkey.extend(def.ordinal, vec![Value::Null; def.primary_key.len()]);
        }
        hkey.extend(parent_def.ordinal, table.parent_key_values(values))
    }
}

struct TableDecl {
    name: String,
    parent: Option<String>,
    fields: Vec<Field>,
    primary_key: Vec<String>,
    parent_join: Vec<String>,
}

/// Builds a [`Group`].
///
/// ```
/// use arbordb_core::catalog::GroupBuilder;
/// use arbordb_core::types::{Field, ValueType};
///
/// let group = GroupBuilder::new("coi")
///     .root("customer", vec![Field::not_null("cid", ValueType::Int), Field::new("name", ValueType::String)], &["cid"])
///     .child("order", "customer", vec![Field::not_null("oid", ValueType::Int), Field::new("cid", ValueType::Int)], &["oid"], &["cid"])
///     .build()
///     .unwrap();
/// assert_eq!(group.table("order").unwrap().depth(), 1);
/// ```
pub struct GroupBuilder {
    name: String,
    decls: Vec<TableDecl>,
}

impl GroupBuilder {
    /// Starts a group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), decls: Vec::new() }
    }

    /// Declares the root table.
    #[must_use]
    pub fn root(mut self, name: &str, fields: Vec<Field>, primary_key: &[&str]) -> Self {
        self.decls.push(TableDecl {
            name: name.to_owned(),
            parent: None,
            fields,
            primary_key: primary_key.iter().map(|s| (*s).to_owned()).collect(),
            parent_join: Vec::new(),
        });
        self
    }

    /// Declares a child table joined to `parent` by `join` columns.
    #[must_use]
    pub fn child(mut self, name: &str, parent: &str, fields: Vec<Field>, primary_key: &[&str], join: &[&str]) -> Self {
        self.decls.push(TableDecl {
            name: name.to_owned(),
            parent: Some(parent.to_owned()),
            fields,
            primary_key: primary_key.iter().map(|s| (*s).to_owned()).collect(),
            parent_join: join.iter().map(|s| (*s).to_owned()).collect(),
        });
        self
    }

    /// Validates the declarations and assigns ordinals depth-first.
    pub fn build(self) -> CoreResult<Arc<Group>> {
        let roots: Vec<usize> = (0..self.decls.len()).filter(|&i| self.decls[i].parent.is_none()).collect();
        let [root] = roots[..] else {
            return Err(CoreError::invalid_argument(format!(
                "group {} must have exactly one root table, found {}",
                self.name,
                roots.len()
            )));
        };

        let mut order = Vec::with_capacity(self.decls.len());
        let mut visiting = vec![root];
        while let Some(current) = visiting.pop() {
            order.push(current);
            let children = (0..self.decls.len())
                .filter(|&i| self.decls[i].parent.as_deref() == Some(self.decls[current].name.as_str()));
            let mut children: Vec<usize> = children.collect();
            children.reverse();
            visiting.extend(children);
        }
        if order.len() != self.decls.len() {
            return Err(CoreError::invalid_argument(format!(
                "group {} has tables unreachable from the root",
                self.name
            )));
        }

        let mut tables: Vec<TableDef> = Vec::with_capacity(order.len());
        for (position, &decl_index) in order.iter().enumerate() {
            let decl = &self.decls[decl_index];
            let column = |name: &str| {
                decl.fields.iter().position(|f| f.name == name).ok_or_else(|| CoreError::UnknownColumn {
                    table: decl.name.clone(),
                    column: name.to_owned(),
                })
            };
            let primary_key = decl.primary_key.iter().map(|c| column(c)).collect::<CoreResult<Vec<_>>>()?;
            if primary_key.is_empty() {
                return Err(CoreError::invalid_argument(format!("table {} has no primary key", decl.name)));
            }
            let parent_join = decl.parent_join.iter().map(|c| column(c)).collect::<CoreResult<Vec<_>>>()?;

            let parent = match &decl.parent {
                Some(parent_name) => {
                    let parent = tables
                        .iter()
                        .position(|t| &t.name == parent_name)
                        .ok_or_else(|| CoreError::UnknownTable(parent_name.clone()))?;
                    if tables[parent].primary_key.len() != parent_join.len() {
                        return Err(CoreError::invalid_argument(format!(
                            "join of {} to {} must cover the parent's primary key",
                            decl.name, parent_name
                        )));
                    }
                    Some(parent)
                }
                None => None,
            };

            let mut ancestry = parent.map(|p| tables[p].ancestry.clone()).unwrap_or_default();
            ancestry.push(position);
            let depth = ancestry.len() - 1;
            let ordinal = u32::try_from(position + 1)
                .map_err(|_| CoreError::invalid_argument("too many tables in group"))?;
            let row_type =
                Arc::new(RowType::new(decl.name.clone(), RowKind::Table { ordinal, depth }, decl.fields.clone()));

            tables.push(TableDef {
                name: decl.name.clone(),
                ordinal,
                depth,
                parent,
                primary_key,
                parent_join,
                ancestry,
                row_type,
            });
        }

        Ok(Arc::new(Group { name: self.name, tables }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    pub(crate) fn coi() -> Arc<Group> {
        GroupBuilder::new("coi")
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
                vec![Field::not_null("iid", ValueType::Int), Field::new("oid", ValueType::Int)],
                &["iid"],
                &["oid"],
            )
            .child(
                "address",
                "customer",
                vec![Field::not_null("aid", ValueType::Int), Field::new("cid", ValueType::Int), Field::new("address", ValueType::String)],
                &["aid"],
                &["cid"],
            )
            .build()
            .unwrap()
    }

    #[test]
    fn ordinals_are_depth_first() {
        let group = coi();
        let names: Vec<(&str, u32, usize)> = group.tables().iter().map(|t| (t.name(), t.ordinal(), t.depth())).collect();
        assert_eq!(names, vec![("customer", 1, 0), ("order", 2, 1), ("item", 3, 2), ("address", 4, 1)]);
    }

    #[test]
    fn foreign_keys_are_equivalent_to_parent_keys() {
        let group = coi();
        let item_oid = group.column_ref("item", "oid").unwrap();
        let order_oid = group.column_ref("order", "oid").unwrap();
        let order_cid = group.column_ref("order", "cid").unwrap();
        let customer_cid = group.column_ref("customer", "cid").unwrap();
        let customer_name = group.column_ref("customer", "name").unwrap();

        assert!(group.columns_equivalent(item_oid, order_oid));
        assert!(group.columns_equivalent(order_cid, customer_cid));
        assert!(!group.columns_equivalent(order_cid, order_oid));
        assert_eq!(group.hkey_component(customer_name), None);
        assert_eq!(group.hkey_component(order_cid), Some(HKeyComponent { depth: 0, position: 0 }));
    }

    #[test]
    fn ancestry_and_orphan_hkeys() {
        let group = coi();
        let item = group.table("item").unwrap();
        assert!(group.is_ancestor(0, 2));
        assert!(!group.is_ancestor(3, 2));
        let hkey = group.orphan_parent_hkey(item, &[Value::Int(111), Value::Int(11)]);
        assert_eq!(hkey, HKey::root(1, vec![Value::Null]).extend(2, vec![Value::Int(11)]));
    }

    #[test]
    fn rejects_two_roots() {
        let result = GroupBuilder::new("bad")
            .root("a", vec![Field::not_null("id", ValueType::Int)], &["id"])
            .root("b", vec![Field::not_null("id", ValueType::Int)], &["id"])
            .build();
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
    }
}
