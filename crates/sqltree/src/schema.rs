//! Tables, columns and foreign keys.
//!
//! Tables are immutable once built. Each column refers back to its table
//! through a weak [`ParentRef`]; whoever holds the [`Table`] (usually a
//! [`MetaData`]) keeps it alive.

use crate::error::{SqlError, SqlResult};
use crate::generative::node_wrapper;
use crate::node::{ColumnData, Element, Node, NodeId, NodeKind, ParentRef};
use crate::types::SqlType;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// A group of one or more foreign-key column pairs declared together.
///
/// Constraints compare by identity: two separately declared constraints over
/// the same columns are different constraints.
#[derive(Debug)]
pub struct ForeignKeyConstraint {
    id: NodeId,
    name: Option<String>,
    table: String,
    columns: Vec<String>,
}

impl ForeignKeyConstraint {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name of the declaring table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Keys of the referencing columns, in declaration order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl PartialEq for ForeignKeyConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ForeignKeyConstraint {}

impl Hash for ForeignKeyConstraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// What a foreign key points at.
#[derive(Clone)]
pub enum Referent {
    /// A column of another table.
    Column(Element),
    /// A column of the declaring table itself, looked up by key.
    Local { table: Weak<Node>, column: String },
}

impl Referent {
    /// The referenced column, if its table is still alive.
    pub fn resolve(&self) -> Option<Element> {
        match self {
            Referent::Column(c) => Some(c.clone()),
            Referent::Local { table, column } => {
                let table = Element(table.upgrade()?);
                let found = table.columns().get(column).cloned();
                found
            }
        }
    }
}

impl fmt::Debug for Referent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referent::Column(c) => write!(f, "Column({:?})", c),
            Referent::Local { column, .. } => write!(f, "Local({})", column),
        }
    }
}

/// Foreign-key information stored on a referencing column.
#[derive(Debug, Clone)]
pub struct ForeignKeyTarget {
    pub referent: Referent,
    pub constraint: Arc<ForeignKeyConstraint>,
}

/// A referencing column paired with the column it references.
#[derive(Debug, Clone)]
pub struct ForeignKey {
    /// The referencing column, as exposed by the selectable the key came from.
    pub parent: Element,
    pub referent: Referent,
    pub constraint: Arc<ForeignKeyConstraint>,
}

impl ForeignKey {
    /// The referenced column.
    pub fn column(&self) -> Option<Element> {
        self.referent.resolve()
    }

    /// The column of `selectable` that stands for the referenced column.
    pub fn get_referent(&self, selectable: &Element) -> Option<Element> {
        let target = self.column()?;
        selectable.columns().corresponding_column(&target, false)
    }

    /// `true` when the referenced column belongs to `table`.
    pub fn references(&self, table: &Element) -> bool {
        self.column()
            .and_then(|c| c.as_column().and_then(|d| d.parent.as_ref().map(|p| p.id())))
            .is_some_and(|id| id == table.identity())
    }

    /// `table.column` of the referenced column.
    pub fn target_fullname(&self) -> String {
        match &self.referent {
            Referent::Column(c) => c.qualified_name(),
            Referent::Local { column, .. } => format!("{}.{}", self.constraint.table, column),
        }
    }
}

impl Element {
    /// The selectable a column belongs to, if it is still alive.
    pub fn column_parent(&self) -> Option<Element> {
        let parent = self.as_column()?.parent.as_ref()?;
        let upgraded = parent.upgrade();
        if upgraded.is_none() {
            tracing::warn!(
                target: "sqltree",
                column = %self.column_key(),
                parent = %parent.name().description(),
                "parent selectable of column was dropped"
            );
        }
        upgraded
    }

    /// `parent.name` for columns, the column key otherwise.
    pub fn qualified_name(&self) -> String {
        match self.as_column() {
            Some(c) => match &c.parent {
                Some(p) => format!("{}.{}", p.name().description(), c.name),
                None => c.name.clone(),
            },
            None => self.column_key(),
        }
    }
}

/// Table payload.
#[derive(Debug, Clone)]
pub struct TableData {
    pub name: String,
    pub schema: Option<String>,
    pub columns: Vec<Element>,
    pub constraints: Vec<Arc<ForeignKeyConstraint>>,
}

node_wrapper! {
    /// A physical table.
    Table, Table, TableData
}

impl Table {
    /// Start declaring a table.
    pub fn build(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn schema(&self) -> Option<&str> {
        self.data().schema.as_deref()
    }

    /// `schema.name`, or `name` without a schema.
    pub fn fullname(&self) -> String {
        match self.schema() {
            Some(s) => format!("{}.{}", s, self.name()),
            None => self.name().to_string(),
        }
    }

    pub fn constraints(&self) -> &[Arc<ForeignKeyConstraint>] {
        &self.data().constraints
    }
}

#[derive(Debug, Clone)]
enum RefSpec {
    Column(Element),
    Local(String),
}

/// Declaration of one table column.
#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: String,
    key: Option<String>,
    type_: SqlType,
    primary_key: bool,
    nullable: Option<bool>,
    references: Option<RefSpec>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, type_: SqlType) -> Self {
        Self {
            name: name.into(),
            key: None,
            type_,
            primary_key: false,
            nullable: None,
            references: None,
        }
    }

    /// Collect the column under `key` instead of its name.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Single-column foreign key to a column of another table.
    pub fn references(mut self, column: &Element) -> Self {
        self.references = Some(RefSpec::Column(column.clone()));
        self
    }

    /// Single-column foreign key to a column of the table being declared.
    pub fn references_local(mut self, column: impl Into<String>) -> Self {
        self.references = Some(RefSpec::Local(column.into()));
        self
    }
}

#[derive(Debug, Clone)]
struct CompositeDef {
    name: Option<String>,
    columns: Vec<String>,
    targets: Vec<RefSpec>,
}

/// Builder for [`Table`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    schema: Option<String>,
    columns: Vec<ColumnDef>,
    composites: Vec<CompositeDef>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns: Vec::new(),
            composites: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Composite foreign key: `columns` of this table reference `targets`, pairwise.
    pub fn foreign_key(self, columns: &[&str], targets: &[Element]) -> Self {
        self.add_composite(None, columns, targets)
    }

    /// Named composite foreign key.
    pub fn foreign_key_named(self, name: &str, columns: &[&str], targets: &[Element]) -> Self {
        self.add_composite(Some(name.to_string()), columns, targets)
    }

    fn add_composite(mut self, name: Option<String>, columns: &[&str], targets: &[Element]) -> Self {
        self.composites.push(CompositeDef {
            name,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            targets: targets.iter().cloned().map(RefSpec::Column).collect(),
        });
        self
    }

    fn column_key(def: &ColumnDef) -> &str {
        def.key.as_deref().unwrap_or(&def.name)
    }

    fn validate(&self) -> SqlResult<()> {
        let mut keys = HashSet::new();
        for def in &self.columns {
            if !keys.insert(Self::column_key(def)) {
                return Err(SqlError::argument(format!(
                    "Table '{}' declares column '{}' twice",
                    self.name,
                    Self::column_key(def)
                )));
            }
        }
        let check_target = |spec: &RefSpec| -> SqlResult<()> {
            match spec {
                RefSpec::Column(c) if c.is_column() => Ok(()),
                RefSpec::Column(other) => Err(SqlError::argument(format!(
                    "Foreign key target {:?} is not a column",
                    other
                ))),
                RefSpec::Local(name) if keys.contains(name.as_str()) => Ok(()),
                RefSpec::Local(name) => Err(SqlError::argument(format!(
                    "Table '{}' has no column '{}' to reference",
                    self.name, name
                ))),
            }
        };
        for def in &self.columns {
            if let Some(spec) = &def.references {
                check_target(spec)?;
            }
        }
        for composite in &self.composites {
            if composite.columns.is_empty() || composite.columns.len() != composite.targets.len() {
                return Err(SqlError::argument(format!(
                    "Foreign key on '{}' pairs {} columns with {} targets",
                    self.name,
                    composite.columns.len(),
                    composite.targets.len()
                )));
            }
            for column in &composite.columns {
                if !keys.contains(column.as_str()) {
                    return Err(SqlError::argument(format!(
                        "Foreign key on '{}' names unknown column '{}'",
                        self.name, column
                    )));
                }
            }
            for target in &composite.targets {
                check_target(target)?;
            }
        }
        Ok(())
    }

    /// Validate the declaration and build the table.
    pub fn finish(self) -> SqlResult<Table> {
        self.validate()?;
        let id = NodeId::next();
        let element = Element::from_kind_cyclic(id, |weak| self.assemble(id, weak));
        Ok(Table(element))
    }

    fn assemble(&self, id: NodeId, weak: &Weak<Node>) -> NodeKind {
        let mut constraints = Vec::new();
        let mut targets: HashMap<&str, Vec<ForeignKeyTarget>> = HashMap::new();
        let referent = |spec: &RefSpec| match spec {
            RefSpec::Column(c) => Referent::Column(c.clone()),
            RefSpec::Local(name) => Referent::Local {
                table: weak.clone(),
                column: name.clone(),
            },
        };

        for def in &self.columns {
            if let Some(spec) = &def.references {
                let constraint = Arc::new(ForeignKeyConstraint {
                    id: NodeId::next(),
                    name: None,
                    table: self.name.clone(),
                    columns: vec![Self::column_key(def).to_string()],
                });
                constraints.push(constraint.clone());
                targets.entry(Self::column_key(def)).or_default().push(ForeignKeyTarget {
                    referent: referent(spec),
                    constraint,
                });
            }
        }
        for composite in &self.composites {
            let constraint = Arc::new(ForeignKeyConstraint {
                id: NodeId::next(),
                name: composite.name.clone(),
                table: self.name.clone(),
                columns: composite.columns.clone(),
            });
            constraints.push(constraint.clone());
            for (column, target) in composite.columns.iter().zip(&composite.targets) {
                targets.entry(column.as_str()).or_default().push(ForeignKeyTarget {
                    referent: referent(target),
                    constraint: constraint.clone(),
                });
            }
        }

        let parent = ParentRef::new(id, self.name.clone().into(), weak.clone());
        let columns = self
            .columns
            .iter()
            .map(|def| {
                let key = Self::column_key(def);
                let mut data = ColumnData::new(def.name.clone(), def.type_);
                data.key = key.to_string();
                data.primary_key = def.primary_key;
                data.nullable = def.nullable.unwrap_or(!def.primary_key);
                data.parent = Some(parent.clone());
                data.foreign_keys = targets.remove(key).unwrap_or_default();
                Element::from_kind(NodeKind::Column(data))
            })
            .collect();

        NodeKind::Table(TableData {
            name: self.name.clone(),
            schema: self.schema.clone(),
            columns,
            constraints,
        })
    }
}

const DEFAULT_SCHEMA: &str = "public";

/// Registry owning tables by schema and name.
#[derive(Debug, Clone, Default)]
pub struct MetaData {
    tables: HashMap<String, HashMap<String, Table>>,
    order: Vec<Table>,
}

impl MetaData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `builder` and register the resulting table.
    pub fn define(&mut self, builder: TableBuilder) -> SqlResult<Table> {
        let table = builder.finish()?;
        self.add(table.clone())?;
        Ok(table)
    }

    /// Register a table; a second table with the same schema and name is rejected.
    pub fn add(&mut self, table: Table) -> SqlResult<()> {
        let schema = table.schema().unwrap_or(DEFAULT_SCHEMA).to_string();
        let tables = self.tables.entry(schema).or_default();
        if tables.contains_key(table.name()) {
            return Err(SqlError::invalid_request(format!(
                "Table '{}' is already defined for this MetaData instance",
                table.fullname()
            )));
        }
        tables.insert(table.name().to_string(), table.clone());
        self.order.push(table);
        Ok(())
    }

    /// Look up a table in the default schema.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.table_in(DEFAULT_SCHEMA, name)
    }

    pub fn table_in(&self, schema: &str, name: &str) -> Option<&Table> {
        self.tables.get(schema).and_then(|t| t.get(name))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    /// Tables in registration order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tables ordered so that referenced tables come before referencing ones.
    ///
    /// Tables caught in a reference cycle keep their registration order.
    pub fn sorted_tables(&self) -> Vec<Table> {
        let index: HashMap<NodeId, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, t)| (t.element().identity(), i))
            .collect();
        let deps: Vec<HashSet<usize>> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, t)| {
                t.element()
                    .foreign_keys()
                    .iter()
                    .filter_map(|fk| fk.column())
                    .filter_map(|c| c.as_column().and_then(|d| d.parent.as_ref().map(|p| p.id())))
                    .filter_map(|id| index.get(&id).copied())
                    .filter(|&dep| dep != i)
                    .collect()
            })
            .collect();

        let mut placed = vec![false; self.order.len()];
        let mut sorted = Vec::with_capacity(self.order.len());
        while sorted.len() < self.order.len() {
            let ready = (0..self.order.len())
                .find(|&i| !placed[i] && deps[i].iter().all(|&d| placed[d]))
                .or_else(|| (0..self.order.len()).find(|&i| !placed[i]));
            let Some(i) = ready else { break };
            placed[i] = true;
            sorted.push(self.order[i].clone());
        }
        sorted
    }
}
