//! INSERT construct, including PostgreSQL-style `ON CONFLICT`.

use crate::annotation::{Annotations, UPSERT_EXCLUDED};
use crate::collection::ColumnCollection;
use crate::error::{SqlError, SqlResult};
use crate::expression::Operand;
use crate::generative::{Generative, node_wrapper};
use crate::node::{CloneFn, Element};
use crate::selectable::{Alias, FromClause};
use crate::statement::Select;

/// Column designator in `values()`: a key of the target table or one of its columns.
#[derive(Debug, Clone)]
pub enum ValueTarget {
    Key(String),
    Column(Element),
}

impl From<&str> for ValueTarget {
    fn from(key: &str) -> Self {
        ValueTarget::Key(key.to_string())
    }
}

impl From<String> for ValueTarget {
    fn from(key: String) -> Self {
        ValueTarget::Key(key)
    }
}

impl From<Element> for ValueTarget {
    fn from(column: Element) -> Self {
        ValueTarget::Column(column)
    }
}

impl From<&Element> for ValueTarget {
    fn from(column: &Element) -> Self {
        ValueTarget::Column(column.clone())
    }
}

impl ValueTarget {
    /// The table column this target names.
    pub(crate) fn resolve(self, table: &Element) -> SqlResult<Element> {
        match self {
            ValueTarget::Key(key) => table.columns().get(&key).cloned().ok_or_else(|| {
                SqlError::argument(format!("Unconsumed column names: {}", key))
            }),
            ValueTarget::Column(col) => {
                if table.columns().contains_column(&col) {
                    return Ok(col);
                }
                table.corresponding_column(&col, true).ok_or_else(|| {
                    SqlError::argument(format!(
                        "Column {} is not a column of {}",
                        col.qualified_name(),
                        table.description()
                    ))
                })
            }
        }
    }
}

/// `ON CONFLICT` clause.
#[derive(Debug, Clone)]
pub enum OnConflict {
    DoNothing {
        index_elements: Vec<Element>,
    },
    DoUpdate {
        index_elements: Vec<Element>,
        set: Vec<(Element, Element)>,
        where_clause: Option<Element>,
    },
}

impl OnConflict {
    fn children(&self) -> Vec<&Element> {
        match self {
            OnConflict::DoNothing { index_elements } => index_elements.iter().collect(),
            OnConflict::DoUpdate {
                index_elements,
                set,
                where_clause,
            } => {
                let mut out: Vec<&Element> = index_elements.iter().collect();
                for (col, value) in set {
                    out.push(col);
                    out.push(value);
                }
                out.extend(where_clause.iter());
                out
            }
        }
    }

    fn copy_internals(&self, clone: &mut CloneFn<'_>) -> OnConflict {
        match self {
            OnConflict::DoNothing { index_elements } => OnConflict::DoNothing {
                index_elements: index_elements.iter().map(|e| clone(e)).collect(),
            },
            OnConflict::DoUpdate {
                index_elements,
                set,
                where_clause,
            } => OnConflict::DoUpdate {
                index_elements: index_elements.iter().map(|e| clone(e)).collect(),
                set: set.iter().map(|(c, v)| (clone(c), clone(v))).collect(),
                where_clause: where_clause.as_ref().map(|e| clone(e)),
            },
        }
    }
}

/// INSERT payload.
#[derive(Debug, Clone)]
pub struct InsertData {
    pub table: Element,
    /// `(column, value)` pairs in insertion order.
    pub values: Vec<(Element, Element)>,
    /// Target columns of `INSERT ... SELECT`.
    pub select_columns: Vec<Element>,
    pub select: Option<Element>,
    pub returning: Vec<Element>,
    pub on_conflict: Option<OnConflict>,
}

impl InsertData {
    pub(crate) fn children(&self) -> Vec<&Element> {
        let mut out = vec![&self.table];
        for (col, value) in &self.values {
            out.push(col);
            out.push(value);
        }
        out.extend(self.select_columns.iter());
        out.extend(self.select.iter());
        out.extend(self.returning.iter());
        if let Some(on_conflict) = &self.on_conflict {
            out.extend(on_conflict.children());
        }
        out
    }

    pub(crate) fn copy_internals(&self, clone: &mut CloneFn<'_>) -> InsertData {
        InsertData {
            table: clone(&self.table),
            values: self.values.iter().map(|(c, v)| (clone(c), clone(v))).collect(),
            select_columns: self.select_columns.iter().map(|e| clone(e)).collect(),
            select: self.select.as_ref().map(|e| clone(e)),
            returning: self.returning.iter().map(|e| clone(e)).collect(),
            on_conflict: self.on_conflict.as_ref().map(|o| o.copy_internals(clone)),
        }
    }

    fn set_values(&mut self, pairs: Vec<(Element, Element)>) -> SqlResult<()> {
        if self.select.is_some() {
            return Err(SqlError::argument(
                "This construct already inserts from a SELECT; values() cannot be combined with it",
            ));
        }
        for (col, value) in pairs {
            match self.values.iter_mut().find(|(c, _)| *c == col) {
                Some(existing) => existing.1 = value,
                None => self.values.push((col, value)),
            }
        }
        Ok(())
    }
}

node_wrapper! {
    /// `INSERT INTO table ...`.
    Insert, Insert, InsertData
}

impl Insert {
    pub fn new(table: impl Into<Element>) -> Self {
        Insert(Element::from_kind(crate::node::NodeKind::Insert(InsertData {
            table: table.into(),
            values: Vec::new(),
            select_columns: Vec::new(),
            select: None,
            returning: Vec::new(),
            on_conflict: None,
        })))
    }

    pub fn table(&self) -> &Element {
        &self.data().table
    }

    fn resolve_pairs<T: Into<ValueTarget>, V: Into<Operand>>(
        &self,
        pairs: impl IntoIterator<Item = (T, V)>,
    ) -> SqlResult<Vec<(Element, Element)>> {
        let table = self.table();
        pairs
            .into_iter()
            .map(|(target, value)| {
                let target: ValueTarget = target.into();
                let col = target.resolve(table)?;
                let value: Operand = value.into();
                Ok((col.clone(), value.into_element(&col)))
            })
            .collect()
    }

    /// Set column values; later values for the same column win.
    pub fn values<T: Into<ValueTarget>, V: Into<Operand>>(
        &self,
        pairs: impl IntoIterator<Item = (T, V)>,
    ) -> SqlResult<Self> {
        let pairs = self.resolve_pairs(pairs)?;
        self.try_generate(|d| d.set_values(pairs))
    }

    /// `INSERT INTO table (names...) SELECT ...`. Cannot be combined with `values()`.
    pub fn from_select(&self, names: &[&str], select: &Select) -> SqlResult<Self> {
        let table = self.table().clone();
        let columns = names
            .iter()
            .map(|n| ValueTarget::from(*n).resolve(&table))
            .collect::<SqlResult<Vec<_>>>()?;
        if columns.len() != select.columns().len() {
            return Err(SqlError::argument(format!(
                "from_select() names {} columns but the select has {}",
                columns.len(),
                select.columns().len()
            )));
        }
        self.try_generate(|d| {
            if !d.values.is_empty() {
                return Err(SqlError::argument(
                    "This construct already inserts value expressions; from_select() cannot be combined with them",
                ));
            }
            d.select_columns = columns;
            d.select = Some(select.element().clone());
            Ok(())
        })
    }

    pub fn returning(&self, columns: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| d.returning.extend(columns))
    }

    /// `ON CONFLICT (index_elements) DO NOTHING`.
    pub fn on_conflict_do_nothing(&self, index_elements: impl IntoIterator<Item = Element>) -> Self {
        let index_elements = index_elements.into_iter().collect();
        self.generate(|d| d.on_conflict = Some(OnConflict::DoNothing { index_elements }))
    }

    /// `ON CONFLICT (index_elements) DO UPDATE SET ... [WHERE ...]`.
    pub fn on_conflict_do_update<T: Into<ValueTarget>, V: Into<Operand>>(
        &self,
        index_elements: impl IntoIterator<Item = Element>,
        set: impl IntoIterator<Item = (T, V)>,
        where_clause: Option<Element>,
    ) -> SqlResult<Self> {
        let set = self.resolve_pairs(set)?;
        if set.is_empty() {
            return Err(SqlError::argument(
                "on_conflict_do_update() needs at least one SET pair",
            ));
        }
        let index_elements = index_elements.into_iter().collect();
        Ok(self.generate(|d| {
            d.on_conflict = Some(OnConflict::DoUpdate {
                index_elements,
                set,
                where_clause,
            })
        }))
    }

    /// The `excluded` pseudo-table of an upsert.
    pub fn excluded(&self) -> Excluded {
        Excluded::new(self.table())
    }

    pub fn append_values<T: Into<ValueTarget>, V: Into<Operand>>(
        &mut self,
        pairs: impl IntoIterator<Item = (T, V)>,
    ) -> SqlResult<()> {
        let pairs = self.resolve_pairs(pairs)?;
        self.mutate_in_place(|d| d.set_values(pairs))
    }
}

/// Columns of the row proposed for insertion, usable in `ON CONFLICT DO UPDATE`.
///
/// Every column carries the [`UPSERT_EXCLUDED`] annotation and renders as
/// `excluded.<name>`.
#[derive(Debug, Clone)]
pub struct Excluded {
    alias: Alias,
    columns: ColumnCollection,
}

impl Excluded {
    fn new(table: &Element) -> Self {
        let alias = table.alias(Some("excluded"));
        let mut columns = ColumnCollection::new();
        let marker = Annotations::new().with(UPSERT_EXCLUDED, true);
        for (key, col) in alias.columns().entries() {
            columns.add_keyed(key, col.annotate(marker.clone()));
        }
        Self { alias, columns }
    }

    pub fn alias(&self) -> &Alias {
        &self.alias
    }

    pub fn columns(&self) -> &ColumnCollection {
        &self.columns
    }

    pub fn c(&self, key: &str) -> SqlResult<Element> {
        self.columns
            .get(key)
            .cloned()
            .ok_or_else(|| SqlError::argument(format!("'excluded' has no column '{}'", key)))
    }
}
