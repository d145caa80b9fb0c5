//! SELECT construct.

use super::{and_criteria, check_attached, collect_froms};
use crate::collection::ColumnCollection;
use crate::error::{SqlError, SqlResult};
use crate::expression::{Operand, literal};
use crate::generative::{Generative, node_wrapper};
use crate::labels::{AnonLabel, LabelName};
use crate::lineage::expand_cloned;
use crate::node::{CloneFn, Element, NodeKind};
use crate::selectable::{
    Alias, CompoundKeyword, CompoundSelect, FromClause, Join, cloned_intersection, exists,
};
use std::collections::HashSet;

/// SELECT payload.
#[derive(Debug, Clone)]
pub struct SelectData {
    pub raw_columns: Vec<Element>,
    pub where_clause: Option<Element>,
    pub having: Option<Element>,
    pub group_by: Vec<Element>,
    pub order_by: Vec<Element>,
    /// Explicit FROM objects, in order.
    pub from_obj: Vec<Element>,
    pub correlate: Vec<Element>,
    pub auto_correlate: bool,
    pub limit: Option<Element>,
    pub offset: Option<Element>,
    pub distinct: bool,
    /// FROM objects implied by columns and criteria; holds their parents alive.
    implicit_froms: Vec<Element>,
}

impl SelectData {
    fn new(columns: Vec<Element>) -> Self {
        let mut data = Self {
            raw_columns: columns,
            where_clause: None,
            having: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            from_obj: Vec::new(),
            correlate: Vec::new(),
            auto_correlate: true,
            limit: None,
            offset: None,
            distinct: false,
            implicit_froms: Vec::new(),
        };
        data.refresh();
        data
    }

    pub(crate) fn children(&self) -> Vec<&Element> {
        let mut out: Vec<&Element> = self.raw_columns.iter().collect();
        out.extend(self.from_obj.iter());
        out.extend(self.where_clause.iter());
        out.extend(self.having.iter());
        out.extend(self.group_by.iter());
        out.extend(self.order_by.iter());
        out.extend(self.limit.iter());
        out.extend(self.offset.iter());
        out
    }

    pub(crate) fn copy_internals(&self, clone: &mut CloneFn<'_>) -> SelectData {
        let mut data = SelectData {
            raw_columns: self.raw_columns.iter().map(|e| clone(e)).collect(),
            where_clause: self.where_clause.as_ref().map(|e| clone(e)),
            having: self.having.as_ref().map(|e| clone(e)),
            group_by: self.group_by.iter().map(|e| clone(e)).collect(),
            order_by: self.order_by.iter().map(|e| clone(e)).collect(),
            from_obj: self.from_obj.iter().map(|e| clone(e)).collect(),
            correlate: self.correlate.iter().map(|e| clone(e)).collect(),
            auto_correlate: self.auto_correlate,
            limit: self.limit.as_ref().map(|e| clone(e)),
            offset: self.offset.as_ref().map(|e| clone(e)),
            distinct: self.distinct,
            implicit_froms: Vec::new(),
        };
        data.refresh();
        data
    }

    fn refresh(&mut self) {
        self.implicit_froms = collect_froms(self.raw_columns.iter().chain(self.where_clause.iter()));
    }

    /// FROM candidates: implied ones first, then explicit ones, de-duplicated
    /// by clone lineage.
    pub(crate) fn locate_froms(&self) -> Vec<Element> {
        let mut froms = Vec::new();
        let mut seen: HashSet<Element> = HashSet::new();
        for item in self.implicit_froms.iter().chain(self.from_obj.iter()) {
            let chain = item.clone_chain();
            if chain.iter().any(|c| seen.contains(c)) {
                continue;
            }
            seen.extend(chain);
            froms.push(item.clone());
        }
        froms
    }

    /// Exported columns: a proxy per projected item.
    pub(crate) fn populate_columns(&self, owner: &Element) -> ColumnCollection {
        let parent_name = LabelName::Plain(owner.description());
        let mut cc = ColumnCollection::new();
        for item in &self.raw_columns {
            let (name, key) = match item.kind() {
                NodeKind::Column(c) => (c.name.clone(), c.key.clone()),
                NodeKind::Label(l) => (l.name.to_string(), l.name.to_string()),
                _ => {
                    let anon = projection_label(item).to_string();
                    (anon.clone(), anon)
                }
            };
            cc.add_keyed(key.clone(), item.make_proxy(owner, &parent_name, name, key));
        }
        cc
    }
}

/// Anonymous name a bare expression gets in a projection.
pub(crate) fn projection_label(item: &Element) -> AnonLabel {
    match item.kind() {
        NodeKind::Function(_) | NodeKind::Label(_) => item.anon_label(),
        _ => AnonLabel::new(item.identity(), "anon"),
    }
}

node_wrapper! {
    /// `SELECT ... FROM ... WHERE ...`.
    Select, Select, SelectData
}

impl FromClause for Select {
    fn from_element(&self) -> &Element {
        &self.0
    }
}

impl Select {
    pub fn new(columns: impl IntoIterator<Item = Element>) -> Self {
        Select(Element::from_kind(NodeKind::Select(SelectData::new(
            columns.into_iter().collect(),
        ))))
    }

    pub(crate) fn with_from(self, from: &Element) -> Self {
        self.generate(|d| d.from_obj.push(from.clone()))
    }

    pub fn raw_columns(&self) -> &[Element] {
        &self.data().raw_columns
    }

    pub fn where_clause(&self) -> Option<&Element> {
        self.data().where_clause.as_ref()
    }

    pub fn order_by_clauses(&self) -> &[Element] {
        &self.data().order_by
    }

    /// FROM objects rendered for this select when nested in a statement whose
    /// FROM objects are `enclosing`.
    ///
    /// Entities hidden by a join are dropped; explicitly correlated entities
    /// found in `enclosing` are dropped; with auto-correlation and more than one
    /// FROM, entities shared with `enclosing` are dropped. Dropping every FROM
    /// that way is an invalid request.
    pub fn froms(&self, enclosing: &[Element]) -> SqlResult<Vec<Element>> {
        let data = self.data();
        check_attached(data.raw_columns.iter().chain(data.where_clause.iter()))?;
        let mut froms = data.locate_froms();
        if froms.iter().any(|f| f.shares_clone_lineage(&self.0)) {
            return Err(SqlError::invalid_request(
                "select() construct refers to itself as a FROM",
            ));
        }
        let hide: Vec<Element> = froms.iter().flat_map(|f| f.hide_froms()).collect();
        let hidden = expand_cloned(hide.iter());
        froms.retain(|f| !hidden.contains(f));
        if !data.correlate.is_empty() {
            let candidates: Vec<Element> = cloned_intersection(&froms, enclosing).into_iter().collect();
            let drop = cloned_intersection(&candidates, &data.correlate);
            froms.retain(|f| !drop.contains(f));
        } else if data.auto_correlate && !enclosing.is_empty() && froms.len() > 1 {
            let drop = cloned_intersection(&froms, enclosing);
            froms.retain(|f| !drop.contains(f));
            if froms.is_empty() {
                return Err(SqlError::invalid_request(
                    "Select statement returned no FROM clauses due to auto-correlation; specify correlate(<tables>) to control correlation manually.",
                ));
            }
        }
        Ok(froms)
    }

    /// Append items to the projection.
    pub fn add_columns(&self, columns: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| {
            d.raw_columns.extend(columns);
            d.refresh();
        })
    }

    /// Replace the projection.
    pub fn with_only_columns(&self, columns: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| {
            d.raw_columns = columns.into_iter().collect();
            d.refresh();
        })
    }

    /// AND `criterion` into the WHERE clause.
    pub fn where_(&self, criterion: Element) -> Self {
        self.generate(|d| {
            d.where_clause = Some(and_criteria(d.where_clause.take(), criterion));
            d.refresh();
        })
    }

    /// `WHERE <last FROM>.<key> = value` for each pair.
    pub fn filter_by<'k, V: Into<Operand>>(
        &self,
        criteria: impl IntoIterator<Item = (&'k str, V)>,
    ) -> SqlResult<Self> {
        let entity = self.last_from().ok_or_else(|| {
            SqlError::invalid_request("filter_by() needs a FROM object to look columns up on")
        })?;
        let mut out = self.clone();
        for (key, value) in criteria {
            let col = entity.c(key)?;
            out = out.where_(col.eq(value));
        }
        Ok(out)
    }

    pub fn having(&self, criterion: Element) -> Self {
        self.generate(|d| d.having = Some(and_criteria(d.having.take(), criterion)))
    }

    pub fn group_by(&self, clauses: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| d.group_by.extend(clauses))
    }

    pub fn order_by(&self, clauses: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| d.order_by.extend(clauses))
    }

    pub fn limit(&self, limit: i64) -> Self {
        self.generate(|d| d.limit = Some(literal(limit)))
    }

    pub fn offset(&self, offset: i64) -> Self {
        self.generate(|d| d.offset = Some(literal(offset)))
    }

    pub fn distinct(&self) -> Self {
        self.generate(|d| d.distinct = true)
    }

    /// Add an explicit FROM object. A select cannot select from itself.
    pub fn select_from(&self, from: impl Into<Element>) -> SqlResult<Self> {
        let from = from.into();
        self.check_not_self(&from)?;
        Ok(self.generate(|d| d.from_obj.push(from)))
    }

    /// Correlate the given FROM objects to an enclosing statement; turns off
    /// auto-correlation.
    pub fn correlate(&self, froms: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| {
            d.auto_correlate = false;
            d.correlate.extend(froms);
        })
    }

    /// Join the last FROM object to `right`, inferring the ON clause when not given.
    pub fn join(&self, right: impl Into<Element>, onclause: Option<Element>) -> SqlResult<Self> {
        self.join_with(right.into(), onclause, false)
    }

    pub fn outerjoin(&self, right: impl Into<Element>, onclause: Option<Element>) -> SqlResult<Self> {
        self.join_with(right.into(), onclause, true)
    }

    fn join_with(&self, right: Element, onclause: Option<Element>, is_outer: bool) -> SqlResult<Self> {
        let left = self.last_from().ok_or_else(|| {
            SqlError::invalid_request("join() needs an existing FROM object to join from")
        })?;
        let join = Join::new(&left, &right, onclause, is_outer, false)?;
        self.try_generate(|d| {
            match d.from_obj.iter().position(|f| *f == left) {
                Some(i) => d.from_obj[i] = join.into_element(),
                None => d.from_obj.push(join.into_element()),
            }
            Ok(())
        })
    }

    fn last_from(&self) -> Option<Element> {
        let data = self.data();
        data.from_obj
            .last()
            .cloned()
            .or_else(|| data.locate_froms().last().cloned())
    }

    fn check_not_self(&self, from: &Element) -> SqlResult<()> {
        let refers_to_self = from
            .from_objects()
            .iter()
            .chain(std::iter::once(from))
            .any(|f| f.shares_clone_lineage(&self.0));
        if refers_to_self {
            return Err(SqlError::invalid_request(
                "select() construct refers to itself as a FROM",
            ));
        }
        Ok(())
    }

    /// Named subquery.
    pub fn subquery(&self, name: Option<&str>) -> Alias {
        self.alias(name)
    }

    /// Scalar subquery usable as a column expression.
    pub fn as_scalar(&self) -> Element {
        Element::from_kind(NodeKind::ScalarSelect(self.0.clone()))
    }

    /// `(SELECT ...) AS name`.
    pub fn label(&self, name: impl Into<String>) -> Element {
        self.as_scalar().label(name)
    }

    /// `EXISTS (SELECT ...)`.
    pub fn exists(&self) -> Element {
        exists(self)
    }

    pub fn union(&self, other: &Select) -> SqlResult<CompoundSelect> {
        self.compound(CompoundKeyword::Union, other)
    }

    pub fn union_all(&self, other: &Select) -> SqlResult<CompoundSelect> {
        self.compound(CompoundKeyword::UnionAll, other)
    }

    pub fn intersect(&self, other: &Select) -> SqlResult<CompoundSelect> {
        self.compound(CompoundKeyword::Intersect, other)
    }

    pub fn except_(&self, other: &Select) -> SqlResult<CompoundSelect> {
        self.compound(CompoundKeyword::Except, other)
    }

    fn compound(&self, keyword: CompoundKeyword, other: &Select) -> SqlResult<CompoundSelect> {
        CompoundSelect::new(keyword, vec![self.0.clone(), other.0.clone()])
    }

    pub fn append_column(&mut self, column: Element) -> SqlResult<()> {
        self.mutate_in_place(|d| {
            d.raw_columns.push(column);
            d.refresh();
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

    pub fn append_having(&mut self, criterion: Element) -> SqlResult<()> {
        self.mutate_in_place(|d| {
            d.having = Some(and_criteria(d.having.take(), criterion));
            Ok(())
        })
    }

    pub fn append_from(&mut self, from: impl Into<Element>) -> SqlResult<()> {
        let from = from.into();
        self.check_not_self(&from)?;
        self.mutate_in_place(|d| {
            d.from_obj.push(from);
            Ok(())
        })
    }

    pub fn append_order_by(&mut self, clauses: impl IntoIterator<Item = Element>) -> SqlResult<()> {
        self.mutate_in_place(|d| {
            d.order_by.extend(clauses);
            Ok(())
        })
    }

    pub fn append_group_by(&mut self, clauses: impl IntoIterator<Item = Element>) -> SqlResult<()> {
        self.mutate_in_place(|d| {
            d.group_by.extend(clauses);
            Ok(())
        })
    }

    pub fn append_correlation(&mut self, from: Element) -> SqlResult<()> {
        self.mutate_in_place(|d| {
            d.auto_correlate = false;
            d.correlate.push(from);
            Ok(())
        })
    }
}
