//! FROM-clause entities: aliases, joins, groupings and set operations.
//!
//! Every FROM-like element exposes a lazily built [`ColumnCollection`]. Tables
//! expose their own columns; aliases, subqueries and set operations expose
//! fresh *proxy* columns whose proxies point back at the columns they were
//! surfaced from; joins expose the columns of both sides unchanged, keyed
//! `<table>_<column>`.

use crate::annotation::{Annotations, WEIGHT};
use crate::collection::ColumnCollection;
use crate::error::{SqlError, SqlResult};
use crate::generative::{Generative, node_wrapper};
use crate::join_condition::JoinResolver;
use crate::labels::LabelName;
use crate::lineage::expand_cloned;
use crate::node::{
    CloneFn, ColumnData, Element, KindTag, NodeId, NodeKind, Operator, ParentRef, UnaryData,
    replacement_traverse, same_children,
};
use crate::schema::ForeignKey;
use crate::statement::Select;
use crate::types::SqlType;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Alias payload.
#[derive(Debug, Clone)]
pub struct AliasData {
    pub element: Element,
    pub name: LabelName,
}

impl AliasData {
    pub(crate) fn children(&self) -> Vec<&Element> {
        vec![&self.element]
    }

    pub(crate) fn copy_internals(&self, clone: &mut CloneFn<'_>) -> AliasData {
        // Tables are immutable; re-aliasing a table never needs a copy of it.
        let element = if self.element.tag() == KindTag::Table {
            self.element.clone()
        } else {
            clone(&self.element)
        };
        AliasData {
            element,
            name: self.name.clone(),
        }
    }
}

/// Join payload.
#[derive(Debug, Clone)]
pub struct JoinData {
    pub left: Element,
    pub right: Element,
    pub onclause: Element,
    pub is_outer: bool,
    pub full: bool,
}

impl JoinData {
    pub(crate) fn children(&self) -> Vec<&Element> {
        vec![&self.left, &self.right, &self.onclause]
    }

    pub(crate) fn copy_internals(&self, clone: &mut CloneFn<'_>) -> JoinData {
        JoinData {
            left: clone(&self.left),
            right: clone(&self.right),
            onclause: clone(&self.onclause),
            is_outer: self.is_outer,
            full: self.full,
        }
    }
}

/// Set operation keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompoundKeyword {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl CompoundKeyword {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompoundKeyword::Union => "UNION",
            CompoundKeyword::UnionAll => "UNION ALL",
            CompoundKeyword::Intersect => "INTERSECT",
            CompoundKeyword::IntersectAll => "INTERSECT ALL",
            CompoundKeyword::Except => "EXCEPT",
            CompoundKeyword::ExceptAll => "EXCEPT ALL",
        }
    }
}

impl fmt::Display for CompoundKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Set operation payload.
#[derive(Debug, Clone)]
pub struct CompoundSelectData {
    pub keyword: CompoundKeyword,
    pub selects: Vec<Element>,
    pub order_by: Vec<Element>,
    pub limit: Option<Element>,
    pub offset: Option<Element>,
}

impl CompoundSelectData {
    pub(crate) fn children(&self) -> Vec<&Element> {
        let mut out: Vec<&Element> = self.selects.iter().collect();
        out.extend(self.order_by.iter());
        out.extend(self.limit.iter());
        out.extend(self.offset.iter());
        out
    }

    pub(crate) fn copy_internals(&self, clone: &mut CloneFn<'_>) -> CompoundSelectData {
        CompoundSelectData {
            keyword: self.keyword,
            selects: self.selects.iter().map(|s| clone(s)).collect(),
            order_by: self.order_by.iter().map(|s| clone(s)).collect(),
            limit: self.limit.as_ref().map(|e| clone(e)),
            offset: self.offset.as_ref().map(|e| clone(e)),
        }
    }
}

node_wrapper! {
    /// A named (or anonymously named) alias of a selectable.
    Alias, Alias, AliasData
}

node_wrapper! {
    /// `left [LEFT OUTER | FULL OUTER] JOIN right ON onclause`.
    Join, Join, JoinData
}

node_wrapper! {
    /// `UNION` / `INTERSECT` / `EXCEPT` of several selects.
    CompoundSelect, CompoundSelect, CompoundSelectData
}

/// Operations shared by everything usable in a FROM clause.
pub trait FromClause {
    fn from_element(&self) -> &Element;

    fn columns(&self) -> &ColumnCollection {
        self.from_element().columns()
    }

    /// Column by key, or an argument error naming the selectable.
    fn c(&self, key: &str) -> SqlResult<Element> {
        let from = self.from_element();
        from.columns().get(key).cloned().ok_or_else(|| {
            SqlError::argument(format!("'{}' has no column '{}'", from.description(), key))
        })
    }

    fn corresponding_column(&self, column: &Element, require_embedded: bool) -> Option<Element> {
        self.from_element()
            .columns()
            .corresponding_column(column, require_embedded)
    }

    fn foreign_keys(&self) -> Vec<ForeignKey> {
        self.from_element().foreign_keys().to_vec()
    }

    fn primary_key(&self) -> Vec<Element> {
        self.from_element().primary_key()
    }

    fn description(&self) -> String {
        self.from_element().description()
    }

    fn is_derived_from(&self, other: &Element) -> bool {
        self.from_element().is_derived_from(other)
    }

    /// Alias of this selectable; `None` gives an anonymous name.
    fn alias(&self, name: Option<&str>) -> Alias {
        Alias::new(self.from_element(), name)
    }

    /// Inner join, inferring the ON clause from foreign keys when not given.
    fn join(&self, right: impl Into<Element>, onclause: Option<Element>) -> SqlResult<Join> {
        Join::new(self.from_element(), &right.into(), onclause, false, false)
    }

    fn outerjoin(&self, right: impl Into<Element>, onclause: Option<Element>) -> SqlResult<Join> {
        Join::new(self.from_element(), &right.into(), onclause, true, false)
    }

    fn full_outer_join(&self, right: impl Into<Element>, onclause: Option<Element>) -> SqlResult<Join> {
        Join::new(self.from_element(), &right.into(), onclause, true, true)
    }

    /// `SELECT <all columns> FROM self`.
    fn select(&self) -> Select {
        let from = self.from_element();
        Select::new(from.columns().iter().cloned()).with_from(from)
    }

    /// Rewrite `expr` so that columns it references are replaced by the
    /// corresponding columns of this selectable.
    fn adapt(&self, expr: &Element) -> Element {
        ClauseAdapter::new(self.from_element()).traverse(expr)
    }
}

impl FromClause for Element {
    fn from_element(&self) -> &Element {
        self
    }
}

macro_rules! from_clause {
    ($($ty:ty),*) => {
        $(
            impl FromClause for $ty {
                fn from_element(&self) -> &Element {
                    &self.0
                }
            }
        )*
    };
}

from_clause!(crate::schema::Table, Alias, Join, CompoundSelect);

impl Alias {
    pub fn new(element: &Element, name: Option<&str>) -> Alias {
        let element = match element.kind() {
            NodeKind::FromGrouping(inner) => inner.clone(),
            _ => element.clone(),
        };
        let id = NodeId::next();
        let name = match name {
            Some(n) => LabelName::Plain(n.to_string()),
            None => {
                let hint = match element.kind() {
                    NodeKind::Table(t) => t.name.clone(),
                    NodeKind::Alias(a) => a.name.description(),
                    _ => "anon".to_string(),
                };
                LabelName::anon(id, hint)
            }
        };
        Alias(Element::from_kind_with_id(id, NodeKind::Alias(AliasData { element, name })))
    }

    pub fn name(&self) -> &LabelName {
        &self.data().name
    }

    /// The aliased selectable.
    pub fn original(&self) -> &Element {
        &self.data().element
    }
}

impl Join {
    /// Build a join. Without `onclause` the condition is inferred from foreign
    /// keys, preferring the right-most member when `left` is itself a join.
    pub fn new(
        left: &Element,
        right: &Element,
        onclause: Option<Element>,
        is_outer: bool,
        full: bool,
    ) -> SqlResult<Join> {
        let right = right.self_group(None);
        let onclause = match onclause {
            Some(on) => on,
            None => {
                let mut resolver = JoinResolver::new(left, &right);
                if let NodeKind::Join(j) = left.kind() {
                    resolver = resolver.left_subset(&j.right);
                }
                resolver.resolve()?
            }
        };
        Ok(Join(Element::from_kind(NodeKind::Join(JoinData {
            left: left.clone(),
            right,
            onclause,
            is_outer,
            full,
        }))))
    }

    pub fn left(&self) -> &Element {
        &self.data().left
    }

    pub fn right(&self) -> &Element {
        &self.data().right
    }

    pub fn onclause(&self) -> &Element {
        &self.data().onclause
    }

    pub fn is_outer(&self) -> bool {
        self.data().is_outer
    }

    pub fn is_full(&self) -> bool {
        self.data().full
    }
}

impl CompoundSelect {
    /// Combine `selects`, which must all have the same number of columns.
    pub fn new(keyword: CompoundKeyword, selects: Vec<Element>) -> SqlResult<CompoundSelect> {
        let mut numcols: Option<usize> = None;
        for (n, s) in selects.iter().enumerate() {
            if !s.tag().is_from_clause() {
                return Err(SqlError::argument(format!(
                    "{} is not selectable in a {}",
                    s.type_name(),
                    keyword
                )));
            }
            let count = s.columns().len();
            match numcols {
                None => numcols = Some(count),
                Some(expected) if expected != count => {
                    return Err(SqlError::argument(format!(
                        "All selectables passed to CompoundSelect must have identical numbers of columns; select #1 has {} columns, select #{} has {}",
                        expected,
                        n + 1,
                        count
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(CompoundSelect(Element::from_kind(NodeKind::CompoundSelect(
            CompoundSelectData {
                keyword,
                selects,
                order_by: Vec::new(),
                limit: None,
                offset: None,
            },
        ))))
    }

    pub fn keyword(&self) -> CompoundKeyword {
        self.data().keyword
    }

    pub fn selects(&self) -> &[Element] {
        &self.data().selects
    }

    pub fn order_by(&self, clauses: impl IntoIterator<Item = Element>) -> Self {
        self.generate(|d| d.order_by.extend(clauses))
    }

    pub fn limit(&self, limit: i64) -> Self {
        self.generate(|d| d.limit = Some(crate::expression::literal(limit)))
    }

    pub fn offset(&self, offset: i64) -> Self {
        self.generate(|d| d.offset = Some(crate::expression::literal(offset)))
    }

    /// Scalar subquery of this set operation.
    pub fn as_scalar(&self) -> Element {
        Element::from_kind(NodeKind::ScalarSelect(self.0.clone()))
    }
}

/// `EXISTS (<select>)`.
pub fn exists(select: impl Into<Element>) -> Element {
    let scalar = Element::from_kind(NodeKind::ScalarSelect(select.into()));
    Element::from_kind(NodeKind::Unary(UnaryData {
        element: scalar,
        operator: Some(Operator::Exists),
        modifier: None,
        type_: SqlType::Boolean,
    }))
}

impl Element {
    /// Column collection of a FROM-like element; empty for everything else.
    pub fn columns(&self) -> &ColumnCollection {
        self.0.memo.columns.get_or_init(|| self.populate_columns())
    }

    fn populate_columns(&self) -> ColumnCollection {
        if let Some(annotation) = &self.0.annotation
            && same_children(annotation.source.kind(), self.kind())
        {
            return annotation.source.columns().clone();
        }
        let mut cc = ColumnCollection::new();
        match self.kind() {
            NodeKind::Table(t) => {
                for col in &t.columns {
                    cc.add(col.clone());
                }
            }
            NodeKind::Alias(a) => {
                for (key, col) in a.element.columns().entries() {
                    let name = col.as_column().map(|c| c.name.clone()).unwrap_or_else(|| key.to_string());
                    cc.add_keyed(key, col.make_proxy(self, &a.name, name, key.to_string()));
                }
            }
            NodeKind::Join(j) => {
                for col in j.left.columns().iter().chain(j.right.columns().iter()) {
                    cc.add_keyed(col.table_qualified_key(), col.clone());
                }
            }
            NodeKind::FromGrouping(e) => return e.columns().clone(),
            NodeKind::Select(s) => return s.populate_columns(self),
            NodeKind::CompoundSelect(c) => {
                let Some(first) = c.selects.first() else {
                    return cc;
                };
                let name = LabelName::Plain(self.description());
                for (i, (key, col)) in first.columns().entries().enumerate() {
                    let col_name = col.as_column().map(|c| c.name.clone()).unwrap_or_else(|| key.to_string());
                    let mut proxy = col.proxy_data(self, &name, col_name, key.to_string());
                    proxy.proxies = c
                        .selects
                        .iter()
                        .enumerate()
                        .filter_map(|(j, s)| {
                            s.columns()
                                .at(i)
                                .map(|sc| sc.annotate(Annotations::new().with(WEIGHT, j + 1)))
                        })
                        .collect();
                    cc.add_keyed(key, Element::from_kind(NodeKind::Column(proxy)));
                }
            }
            _ => {}
        }
        cc
    }

    /// `<parent>_<key>`, the key a column has inside a join.
    pub(crate) fn table_qualified_key(&self) -> String {
        match self.as_column() {
            Some(ColumnData { parent: Some(p), key, .. }) => format!("{}_{}", p.name(), key),
            _ => self.column_key(),
        }
    }

    fn proxy_data(&self, parent: &Element, parent_name: &LabelName, name: String, key: String) -> ColumnData {
        let mut data = ColumnData::new(name, self.type_());
        data.key = key;
        data.parent = Some(ParentRef::new(
            parent.identity(),
            parent_name.clone(),
            parent.downgrade(),
        ));
        data.proxies = vec![self.clone()];
        if let Some(source) = self.as_column() {
            data.primary_key = source.primary_key;
            data.nullable = source.nullable;
            data.foreign_keys = source.foreign_keys.clone();
        }
        data
    }

    /// A new column of `parent` standing for `self`.
    pub(crate) fn make_proxy(&self, parent: &Element, parent_name: &LabelName, name: String, key: String) -> Element {
        Element::from_kind(NodeKind::Column(self.proxy_data(parent, parent_name, name, key)))
    }

    /// Foreign keys of the exposed columns, in column order.
    pub fn foreign_keys(&self) -> &[ForeignKey] {
        self.0.memo.foreign_keys.get_or_init(|| {
            let mut fks = Vec::new();
            for col in self.columns().iter() {
                if let Some(data) = col.as_column() {
                    for target in &data.foreign_keys {
                        fks.push(ForeignKey {
                            parent: col.clone(),
                            referent: target.referent.clone(),
                            constraint: target.constraint.clone(),
                        });
                    }
                }
            }
            fks
        })
    }

    /// Primary-key columns; for joins, reduced by foreign-key and ON-clause equivalence.
    pub fn primary_key(&self) -> Vec<Element> {
        let pk: Vec<Element> = self
            .columns()
            .iter()
            .filter(|c| c.as_column().is_some_and(|d| d.primary_key))
            .cloned()
            .collect();
        match self.kind() {
            NodeKind::Join(j) => reduce_columns(pk, Some(&j.onclause)),
            NodeKind::FromGrouping(e) => e.primary_key(),
            _ => pk,
        }
    }

    /// Short human description used in error messages.
    pub fn description(&self) -> String {
        match self.kind() {
            NodeKind::Table(t) => t.name.clone(),
            NodeKind::Alias(a) => a.name.description(),
            NodeKind::Join(j) => format!(
                "Join object on {}({}) and {}({})",
                j.left.description(),
                j.left.id().get(),
                j.right.description(),
                j.right.id().get()
            ),
            NodeKind::FromGrouping(e) => e.description(),
            NodeKind::Column(c) => c.name.clone(),
            _ => format!("{} object", self.tag().name()),
        }
    }

    /// FROM entities this element draws from when placed in a statement.
    pub fn from_objects(&self) -> Vec<Element> {
        match self.kind() {
            NodeKind::Column(_) => self.column_parent().into_iter().collect(),
            NodeKind::Table(_)
            | NodeKind::Alias(_)
            | NodeKind::Select(_)
            | NodeKind::CompoundSelect(_) => vec![self.clone()],
            NodeKind::Join(j) => {
                let mut out = vec![self.clone()];
                out.extend(j.onclause.from_objects());
                out.extend(j.left.from_objects());
                out.extend(j.right.from_objects());
                out
            }
            NodeKind::FromGrouping(e) => e.from_objects(),
            NodeKind::ScalarSelect(_) | NodeKind::Insert(_) | NodeKind::Update(_) | NodeKind::Delete(_) => {
                Vec::new()
            }
            _ => self
                .children()
                .into_iter()
                .filter(|c| !matches!(c.tag(), KindTag::Select | KindTag::CompoundSelect))
                .flat_map(|c| c.from_objects())
                .collect(),
        }
    }

    /// Columns reached the way [`Element::from_objects`] reaches them whose
    /// parent selectable has been dropped. Such a column contributes no FROM.
    pub fn detached_columns(&self) -> Vec<Element> {
        match self.kind() {
            NodeKind::Column(c) => match &c.parent {
                Some(p) if !p.is_alive() => vec![self.clone()],
                _ => Vec::new(),
            },
            NodeKind::Table(_)
            | NodeKind::Alias(_)
            | NodeKind::Select(_)
            | NodeKind::CompoundSelect(_)
            | NodeKind::ScalarSelect(_)
            | NodeKind::Insert(_)
            | NodeKind::Update(_)
            | NodeKind::Delete(_) => Vec::new(),
            NodeKind::Join(j) => [&j.onclause, &j.left, &j.right]
                .into_iter()
                .flat_map(|e| e.detached_columns())
                .collect(),
            NodeKind::FromGrouping(e) => e.detached_columns(),
            _ => self
                .children()
                .into_iter()
                .filter(|c| !matches!(c.tag(), KindTag::Select | KindTag::CompoundSelect))
                .flat_map(|c| c.detached_columns())
                .collect(),
        }
    }

    /// FROM entities made redundant by this one (a join hides its members).
    pub fn hide_froms(&self) -> Vec<Element> {
        match self.kind() {
            NodeKind::Join(_) => self
                .clone_chain()
                .iter()
                .filter_map(|x| match x.kind() {
                    NodeKind::Join(j) => {
                        let mut out = j.left.from_objects();
                        out.extend(j.right.from_objects());
                        Some(out)
                    }
                    _ => None,
                })
                .flatten()
                .collect(),
            NodeKind::FromGrouping(e) => e.hide_froms(),
            _ => Vec::new(),
        }
    }

    /// `true` when `other` is this selectable or something it was built from.
    pub fn is_derived_from(&self, other: &Element) -> bool {
        if self.cloned_set().contains(other) {
            return true;
        }
        match self.kind() {
            NodeKind::Alias(a) => a.element.is_derived_from(other),
            NodeKind::Join(j) => j.left.is_derived_from(other) || j.right.is_derived_from(other),
            NodeKind::FromGrouping(e) => e.is_derived_from(other),
            NodeKind::Select(s) => s
                .locate_froms()
                .iter()
                .any(|f| !f.same_instance(self) && f.is_derived_from(other)),
            NodeKind::CompoundSelect(c) => c.selects.iter().any(|s| s.is_derived_from(other)),
            _ => false,
        }
    }

    /// Replace references to columns of whatever `alias` was derived from.
    pub fn replace_selectable(&self, alias: &Element) -> Element {
        ClauseAdapter::new(alias).traverse(self)
    }
}

/// Reduce `columns` to those with no natural equivalent in the list.
pub fn reduce_columns(columns: Vec<Element>, onclause: Option<&Element>) -> Vec<Element> {
    let mut omit: HashSet<Element> = HashSet::new();
    for col in &columns {
        let fks = col
            .proxy_set()
            .into_iter()
            .filter_map(|p| p.as_column().map(|d| d.foreign_keys.clone()))
            .flatten()
            .collect::<Vec<_>>();
        for fk in fks {
            let Some(target) = fk.referent.resolve() else { continue };
            if columns.iter().any(|c| c != col && target.shares_lineage(c)) {
                omit.insert(col.clone());
                break;
            }
        }
    }
    if let Some(onclause) = onclause {
        let kept: Vec<&Element> = columns.iter().filter(|c| !omit.contains(*c)).collect();
        let lineage: HashSet<Element> = kept.iter().flat_map(|c| c.proxy_set()).collect();
        for node in crate::node::iterate(onclause) {
            if let NodeKind::Binary(b) = node.kind()
                && b.operator == Operator::Eq
                && lineage.contains(&b.left)
                && lineage.contains(&b.right)
            {
                if let Some(c) = columns.iter().rev().find(|c| c.shares_lineage(&b.right)) {
                    omit.insert(c.clone());
                }
            }
        }
    }
    columns.into_iter().filter(|c| !omit.contains(c)).collect()
}

/// `froms` members sharing clone lineage with anything in `others`.
pub fn cloned_intersection(froms: &[Element], others: &[Element]) -> HashSet<Element> {
    let overlap = expand_cloned(others.iter());
    froms
        .iter()
        .filter(|f| f.clone_chain().iter().any(|n| overlap.contains(n)))
        .cloned()
        .collect()
}

/// Rewrites expressions against a selectable.
///
/// Each FROM entity the selectable was derived from is replaced by the
/// selectable itself, and each column expression is replaced by the
/// selectable's corresponding column, when there is one.
pub struct ClauseAdapter<'a> {
    selectable: Element,
    equivalents: HashMap<Element, Vec<Element>>,
    adapt_on_names: bool,
    include: Option<Box<dyn Fn(&Element) -> bool + 'a>>,
    exclude: Option<Box<dyn Fn(&Element) -> bool + 'a>>,
}

impl<'a> ClauseAdapter<'a> {
    pub fn new(selectable: &Element) -> Self {
        Self {
            selectable: selectable.clone(),
            equivalents: HashMap::new(),
            adapt_on_names: false,
            include: None,
            exclude: None,
        }
    }

    /// Columns known to be interchangeable with a key column.
    pub fn with_equivalents(mut self, equivalents: HashMap<Element, Vec<Element>>) -> Self {
        self.equivalents = equivalents;
        self
    }

    /// Fall back to matching columns by name when lineage finds nothing.
    pub fn adapt_on_names(mut self, enabled: bool) -> Self {
        self.adapt_on_names = enabled;
        self
    }

    /// Only adapt columns accepted by `f`.
    pub fn include(mut self, f: impl Fn(&Element) -> bool + 'a) -> Self {
        self.include = Some(Box::new(f));
        self
    }

    /// Never adapt columns accepted by `f`.
    pub fn exclude(mut self, f: impl Fn(&Element) -> bool + 'a) -> Self {
        self.exclude = Some(Box::new(f));
        self
    }

    pub fn traverse(&self, expr: &Element) -> Element {
        replacement_traverse(expr, &[], |e| self.replace(e))
    }

    /// Replacement for a single node, if any.
    pub fn replace(&self, element: &Element) -> Option<Element> {
        if element.tag().is_from_clause()
            && element.tag() != KindTag::Select
            && self.selectable.is_derived_from(element)
        {
            return Some(self.selectable.clone());
        }
        if !element.tag().is_column_element() {
            return None;
        }
        if self.include.as_ref().is_some_and(|f| !f(element)) {
            return None;
        }
        if self.exclude.as_ref().is_some_and(|f| f(element)) {
            return None;
        }
        self.corresponding(element, &mut HashSet::new())
    }

    fn corresponding(&self, column: &Element, seen: &mut HashSet<Element>) -> Option<Element> {
        let found = self.selectable.columns().corresponding_column(column, true);
        if found.is_some() {
            return found;
        }
        if !seen.contains(column)
            && let Some(equivs) = self.equivalents.get(column)
        {
            seen.insert(column.clone());
            for equiv in equivs {
                if let Some(found) = self.corresponding(equiv, seen) {
                    return Some(found);
                }
            }
        }
        if self.adapt_on_names
            && let Some(name) = column.as_column().map(|c| c.name.as_str())
        {
            return self.selectable.columns().get(name).cloned();
        }
        None
    }
}

/// The embedded corresponding column of `column`, or of one of its equivalents.
pub fn correspond_on_equivalents(
    selectable: &Element,
    column: &Element,
    equivalents: &HashMap<Element, Vec<Element>>,
) -> Option<Element> {
    let found = selectable.columns().corresponding_column(column, true);
    if found.is_some() {
        return found;
    }
    equivalents.get(column).and_then(|equivs| {
        equivs
            .iter()
            .find_map(|e| selectable.columns().corresponding_column(e, true))
    })
}
