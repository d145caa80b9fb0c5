//! DELETE construct.

use super::and_criteria;
use crate::error::SqlResult;
use crate::generative::{Generative, node_wrapper};
use crate::node::{CloneFn, Element, NodeKind};

/// DELETE payload.
#[derive(Debug, Clone)]
pub struct DeleteData {
    pub table: Element,
    pub where_clause: Option<Element>,
    pub returning: Vec<Element>,
}

impl DeleteData {
    pub(crate) fn children(&self) -> Vec<&Element> {
        let mut out = vec![&self.table];
        out.extend(self.where_clause.iter());
        out.extend(self.returning.iter());
        out
    }

    pub(crate) fn copy_internals(&self, clone: &mut CloneFn<'_>) -> DeleteData {
        DeleteData {
            table: clone(&self.table),
            where_clause: self.where_clause.as_ref().map(|e| clone(e)),
            returning: self.returning.iter().map(|e| clone(e)).collect(),
        }
    }
}

node_wrapper! {
    /// `DELETE FROM table [WHERE ...]`.
    Delete, Delete, DeleteData
}

impl Delete {
    pub fn new(table: impl Into<Element>) -> Self {
        Delete(Element::from_kind(NodeKind::Delete(DeleteData {
            table: table.into(),
            where_clause: None,
            returning: Vec::new(),
        })))
    }

    pub fn table(&self) -> &Element {
        &self.data().table
    }

    pub fn where_(&self, criterion: Element) -> Self {
        self.generate(|d| d.where_clause = Some(and_criteria(d.where_clause.take(), criterion)))
    }

    pub fn returning(&self, columns: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| d.returning.extend(columns))
    }

    pub fn append_whereclause(&mut self, criterion: Element) -> SqlResult<()> {
        self.mutate_in_place(|d| {
            d.where_clause = Some(and_criteria(d.where_clause.take(), criterion));
            Ok(())
        })
    }
}
