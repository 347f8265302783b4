//! Table and group index definitions.
//!
//! An index row holds the index's declared columns followed by whatever
//! hkey components the declared columns did not already cover, so every
//! index row can recover the hkey of the row it was built from. The layout
//! is fixed once per index in an [`IndexRowComposition`]; [`IndexToHKey`]
//! is the inverse mapping from hkey components to field positions.

use std::sync::Arc;

use super::group::{ColumnRef, Group, HKeyComponent};
use crate::error::{CoreError, CoreResult};
use crate::types::{Field, HKey, RowKind, RowType, Value};

/// Which rows a group index covers when the path has missing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupIndexJoin {
    /// Every row of the rootmost declared table appears, with null-filled
    /// descendant columns and a partial hkey when descendants are missing.
    Left,
    /// Every row of the leafmost declared table appears, with null-filled
    /// ancestor columns when ancestors are missing.
    Right,
}

/// The kind of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// An index over one table.
    Table,
    /// An index over a root-to-leaf path of a group.
    Group(GroupIndexJoin),
}

/// One field of an index row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionField {
    /// The column the value is taken from.
    pub column: ColumnRef,
    /// The hkey component the field holds, if the column is equivalent to one.
    pub hkey: Option<HKeyComponent>,
    /// True for fields named by the index declaration.
    pub declared: bool,
}

/// Field layout of an index row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRowComposition {
    fields: Vec<CompositionField>,
    declared: usize,
}

impl IndexRowComposition {
    /// Returns all fields.
    #[must_use]
    pub fn fields(&self) -> &[CompositionField] {
        &self.fields
    }

    /// Returns the number of declared fields.
    #[must_use]
    pub const fn declared(&self) -> usize {
        self.declared
    }

    /// Returns the total number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Maps each hkey component of the index's leaf table to an index field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexToHKey {
    segments: Vec<(u32, Vec<usize>)>,
}

impl IndexToHKey {
    /// Returns the field holding `component`.
    #[must_use]
    pub fn field(&self, component: HKeyComponent) -> Option<usize> {
        self.segments.get(component.depth).and_then(|(_, fields)| fields.get(component.position).copied())
    }

    /// Builds the first `depth` segments of an hkey from index row values.
    #[must_use]
    pub fn hkey(&self, values: &[Value], depth: usize) -> HKey {
        let segments = self.segments.iter().take(depth).map(|(ordinal, fields)| {
            let key = fields.iter().map(|&f| values.get(f).cloned().unwrap_or(Value::Null)).collect();
            crate::types::HKeySegment::new(*ordinal, key)
        });
        HKey::from_segments(segments.collect())
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

/// An index definition.
#[derive(Debug, Clone)]
pub struct IndexDef {
    name: String,
    kind: IndexKind,
    group: Arc<Group>,
    root: usize,
    leaf: usize,
    composition: IndexRowComposition,
    index_to_hkey: IndexToHKey,
    row_type: Arc<RowType>,
}

impl IndexDef {
    /// Defines an index on columns of one table.
    pub fn table(group: &Arc<Group>, name: &str, table: &str, columns: &[&str]) -> CoreResult<Arc<Self>> {
        let position = group.table_position(table)?;
        let declared = columns
            .iter()
            .map(|c| group.column_ref(table, c))
            .collect::<CoreResult<Vec<_>>>()?;
        Self::build(group, name, IndexKind::Table, position, position, declared)
    }

    /// Defines a group index on `(table, column)` pairs along one root-to-leaf path.
    pub fn group(
        group: &Arc<Group>,
        name: &str,
        columns: &[(&str, &str)],
        join: GroupIndexJoin,
    ) -> CoreResult<Arc<Self>> {
        let declared = columns
            .iter()
            .map(|(t, c)| group.column_ref(t, c))
            .collect::<CoreResult<Vec<_>>>()?;
        let (root, leaf) = declared.iter().try_fold((None::<usize>, None::<usize>), |(root, leaf), column| {
            let depth = group.table_at(column.table)?.depth();
            let root = match root {
                Some(r) if group.table_at(r)?.depth() <= depth => Some(r),
                _ => Some(column.table),
            };
            let leaf = match leaf {
                Some(l) if group.table_at(l)?.depth() >= depth => Some(l),
                _ => Some(column.table),
            };
            Ok::<_, CoreError>((root, leaf))
        })?;
        let (Some(root), Some(leaf)) = (root, leaf) else {
            return Err(CoreError::invalid_argument(format!("group index {name} declares no columns")));
        };
        let path = group.table_at(leaf)?.ancestry();
        if let Some(stray) = declared.iter().find(|c| !path.contains(&c.table)) {
            return Err(CoreError::invalid_argument(format!(
                "group index {name}: table {} is not on the path to {}",
                group.table_at(stray.table)?.name(),
                group.table_at(leaf)?.name()
            )));
        }
        Self::build(group, name, IndexKind::Group(join), root, leaf, declared)
    }

    fn build(
        group: &Arc<Group>,
        name: &str,
        kind: IndexKind,
        root: usize,
        leaf: usize,
        declared: Vec<ColumnRef>,
    ) -> CoreResult<Arc<Self>> {
        if declared.is_empty() {
            return Err(CoreError::invalid_argument(format!("index {name} declares no columns")));
        }
        let mut fields: Vec<CompositionField> = declared
            .iter()
            .map(|&column| CompositionField { column, hkey: group.hkey_component(column), declared: true })
            .collect();
        let declared_count = fields.len();

        let leaf_def = group.table_at(leaf)?;
        let mut segments = Vec::with_capacity(leaf_def.ancestry().len());
        for (depth, &table) in leaf_def.ancestry().iter().enumerate() {
            let def = group.table_at(table)?;
            let mut positions = Vec::with_capacity(def.primary_key().len());
            for (position, &column) in def.primary_key().iter().enumerate() {
                let component = HKeyComponent { depth, position };
                let field = match fields.iter().position(|f| f.hkey == Some(component)) {
                    Some(field) => field,
                    None => {
                        fields.push(CompositionField {
                            column: ColumnRef { table, column },
                            hkey: Some(component),
                            declared: false,
                        });
                        fields.len() - 1
                    }
                };
                positions.push(field);
            }
            segments.push((def.ordinal(), positions));
        }

        let row_fields = fields
            .iter()
            .map(|f| {
                let table = group.table_at(f.column.table)?;
                let source = &table.row_type().fields()[f.column.column];
                Ok(Field::new(format!("{}.{}", table.name(), source.name), source.value_type))
            })
            .collect::<CoreResult<Vec<_>>>()?;
        let row_type = Arc::new(RowType::new(
            name,
            RowKind::Index { index: name.to_owned(), table_ordinal: leaf_def.ordinal() },
            row_fields,
        ));

        Ok(Arc::new(Self {
            name: name.to_owned(),
            kind,
            group: Arc::clone(group),
            root,
            leaf,
            composition: IndexRowComposition { fields, declared: declared_count },
            index_to_hkey: IndexToHKey { segments },
            row_type,
        }))
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the index kind.
    #[must_use]
    pub const fn kind(&self) -> IndexKind {
        self.kind
    }

    /// Returns the group the index belongs to.
    #[must_use]
    pub const fn owner_group(&self) -> &Arc<Group> {
        &self.group
    }

    /// Returns the rootmost indexed table's position.
    #[must_use]
    pub const fn root_table(&self) -> usize {
        self.root
    }

    /// Returns the leafmost indexed table's position; index rows carry its hkey.
    #[must_use]
    pub const fn leaf_table(&self) -> usize {
        self.leaf
    }

    /// Returns the row composition.
    #[must_use]
    pub const fn composition(&self) -> &IndexRowComposition {
        &self.composition
    }

    /// Returns the hkey mapping.
    #[must_use]
    pub const fn index_to_hkey(&self) -> &IndexToHKey {
        &self.index_to_hkey
    }

    /// Returns the index row type.
    #[must_use]
    pub const fn row_type(&self) -> &Arc<RowType> {
        &self.row_type
    }

    /// Returns the field holding `column`'s value, honoring hkey equivalence.
    #[must_use]
    pub fn field_of(&self, column: ColumnRef) -> Option<usize> {
        if let Some(component) = self.group.hkey_component(column) {
            if let Some(field) = self.index_to_hkey.field(component) {
                return Some(field);
            }
        }
        self.composition.fields.iter().position(|f| f.column == column)
    }

    /// Returns the field holding hkey `component` of the leaf table.
    #[must_use]
    pub fn hkey_field(&self, component: HKeyComponent) -> Option<usize> {
        self.index_to_hkey.field(component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GroupBuilder;
    use crate::types::ValueType;

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

    fn field_names(index: &IndexDef) -> Vec<String> {
        index.row_type().fields().iter().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn table_index_appends_missing_hkey_columns() {
        let group = coi();
        let index = IndexDef::table(&group, "order_salesman", "order", &["salesman"]).unwrap();
        assert_eq!(field_names(&index), vec!["order.salesman", "customer.cid", "order.oid"]);
        assert_eq!(index.composition().declared(), 1);
        assert_eq!(index.hkey_field(HKeyComponent { depth: 0, position: 0 }), Some(1));
        assert_eq!(index.hkey_field(HKeyComponent { depth: 1, position: 0 }), Some(2));
    }

    #[test]
    fn foreign_key_column_covers_parent_hkey_component() {
        let group = coi();
        let index = IndexDef::table(&group, "order_cid", "order", &["cid"]).unwrap();
        assert_eq!(field_names(&index), vec!["order.cid", "order.oid"]);

        let customer_cid = group.column_ref("customer", "cid").unwrap();
        assert_eq!(index.field_of(customer_cid), Some(0));
    }

    #[test]
    fn index_to_hkey_builds_partial_keys() {
        let group = coi();
        let index = IndexDef::table(&group, "item_iid", "item", &["iid"]).unwrap();
        let values = [Value::Int(111), Value::Int(1), Value::Int(11)];
        assert_eq!(index.index_to_hkey().depth(), 3);
        assert_eq!(index.index_to_hkey().hkey(&values, 1), HKey::root(1, vec![Value::Int(1)]));
        assert_eq!(
            index.index_to_hkey().hkey(&values, 3),
            HKey::root(1, vec![Value::Int(1)]).extend(2, vec![Value::Int(11)]).extend(3, vec![Value::Int(111)])
        );
    }

    #[test]
    fn group_index_spans_one_path() {
        let group = coi();
        let index = IndexDef::group(&group, "name_salesman", &[("customer", "name"), ("order", "salesman")], GroupIndexJoin::Left)
            .unwrap();
        assert_eq!(index.root_table(), 0);
        assert_eq!(index.leaf_table(), 1);
        assert_eq!(field_names(&index), vec!["customer.name", "order.salesman", "customer.cid", "order.oid"]);
        assert_eq!(index.row_type().hkey_table_ordinal(), Some(2));
        assert!(Arc::ptr_eq(index.owner_group(), &group));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let group = coi();
        assert!(matches!(
            IndexDef::table(&group, "bad", "order", &["nope"]),
            Err(CoreError::UnknownColumn { .. })
        ));
    }
}
