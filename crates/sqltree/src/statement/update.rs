//! UPDATE construct.

use super::{and_criteria, check_attached, collect_froms};
use crate::error::SqlResult;
use crate::expression::Operand;
use crate::generative::{Generative, node_wrapper};
use crate::node::{CloneFn, Element, NodeKind};
use crate::statement::insert::ValueTarget;

/// UPDATE payload.
#[derive(Debug, Clone)]
pub struct UpdateData {
    pub table: Element,
    pub values: Vec<(Element, Element)>,
    pub where_clause: Option<Element>,
    pub returning: Vec<Element>,
    /// FROM objects other than the target table referenced by values or criteria.
    extra_froms: Vec<Element>,
}

impl UpdateData {
    pub(crate) fn children(&self) -> Vec<&Element> {
        let mut out = vec![&self.table];
        for (col, value) in &self.values {
            out.push(col);
            out.push(value);
        }
        out.extend(self.where_clause.iter());
        out.extend(self.returning.iter());
        out
    }

    pub(crate) fn copy_internals(&self, clone: &mut CloneFn<'_>) -> UpdateData {
        let mut data = UpdateData {
            table: clone(&self.table),
            values: self.values.iter().map(|(c, v)| (clone(c), clone(v))).collect(),
            where_clause: self.where_clause.as_ref().map(|e| clone(e)),
            returning: self.returning.iter().map(|e| clone(e)).collect(),
            extra_froms: Vec::new(),
        };
        data.refresh();
        data
    }

    fn refresh(&mut self) {
        let values = self.values.iter().map(|(_, v)| v);
        let table = self.table.clone();
        self.extra_froms = collect_froms(values.chain(self.where_clause.iter()))
            .into_iter()
            .filter(|f| !f.shares_clone_lineage(&table))
            .collect();
    }

    fn set_values(&mut self, pairs: Vec<(Element, Element)>) {
        for (col, value) in pairs {
            match self.values.iter_mut().find(|(c, _)| *c == col) {
                Some(existing) => existing.1 = value,
                None => self.values.push((col, value)),
            }
        }
        self.refresh();
    }
}

node_wrapper! {
    /// `UPDATE table SET ... [FROM ...] [WHERE ...]`.
    Update, Update, UpdateData
}

impl Update {
    pub fn new(table: impl Into<Element>) -> Self {
        Update(Element::from_kind(NodeKind::Update(UpdateData {
            table: table.into(),
            values: Vec::new(),
            where_clause: None,
            returning: Vec::new(),
            extra_froms: Vec::new(),
        })))
    }

    pub fn table(&self) -> &Element {
        &self.data().table
    }

    /// Tables the statement reads besides its target (`UPDATE .. FROM`).
    pub fn extra_froms(&self) -> &[Element] {
        &self.data().extra_froms
    }

    /// Fails when values or criteria use a column whose table was dropped.
    pub fn check_froms(&self) -> SqlResult<()> {
        let data = self.data();
        check_attached(data.values.iter().map(|(_, v)| v).chain(data.where_clause.iter()))
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

    /// `SET column = value`; unknown keys are argument errors.
    pub fn values<T: Into<ValueTarget>, V: Into<Operand>>(
        &self,
        pairs: impl IntoIterator<Item = (T, V)>,
    ) -> SqlResult<Self> {
        let pairs = self.resolve_pairs(pairs)?;
        Ok(self.generate(|d| d.set_values(pairs)))
    }

    pub fn where_(&self, criterion: Element) -> Self {
        self.generate(|d| {
            d.where_clause = Some(and_criteria(d.where_clause.take(), criterion));
            d.refresh();
        })
    }

    pub fn returning(&self, columns: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| d.returning.extend(columns))
    }

    pub fn append_values<T: Into<ValueTarget>, V: Into<Operand>>(
        &mut self,
        pairs: impl IntoIterator<Item = (T, V)>,
    ) -> SqlResult<()> {
        let pairs = self.resolve_pairs(pairs)?;
        self.mutate_in_place(|d| {
            d.set_values(pairs);
            Ok(())
        })
    }

    pub fn append_whereclause(&mut self, criterion: Element) -> SqlResult<()> {
        self.mutate_in_place(|d| {
            d.where_clause = Some(and_criteria(d.where_clause.take(), criterion));
            d.refresh();
            Ok(())
        })
    }
}
